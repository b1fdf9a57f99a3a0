//! Compute-task dispatch (C10): explicit sends on the matching
//! [`Message`] variant, replacing the original's implicit RPC through
//! `PIOc_*` calls that happen to detect async mode.
//!
//! Reference: spec.md §4.6 — "the component master (rank 0 of the
//! compute communicator) sends the message id ... all compute ranks
//! then broadcast each call argument". Only rank 0 of `comm` calling
//! [`IoClient::send`] actually originates the message; every rank
//! (compute and I/O) must still call into the same broadcast, which is
//! why [`IoServer::run`](crate::server::IoServer::run) and
//! `IoClient::send` are two views of the same collective.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::message::Message;
use crate::wire::broadcast_message;

pub struct IoClient<'a> {
    comm: &'a SimpleCommunicator,
    master: i32,
}

impl<'a> IoClient<'a> {
    pub fn new(comm: &'a SimpleCommunicator, master: i32) -> Self {
        IoClient { comm, master }
    }

    /// Send one message to the I/O service. Must be called by every
    /// rank in `comm`, with the same `msg` value only meaningful on
    /// `master` — other compute ranks pass whatever they like, it's
    /// discarded (they're only here to complete the collective).
    pub fn send(&self, msg: &Message) {
        if self.comm.rank() == self.master {
            broadcast_message(self.comm, self.master, Some(msg));
        } else {
            broadcast_message(self.comm, self.master, None);
        }
    }

    pub fn exit(&self) {
        self.send(&Message::Exit);
    }
}
