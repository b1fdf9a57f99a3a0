//! I/O-task message loop (C10): the explicit `IoServer::run`/`stop`
//! object standing in for the original's implicit non-return-from-init.
//!
//! Reference: spec.md §4.6, §REDESIGN FLAGS "Async control flow".

use mpi::topology::SimpleCommunicator;

use crate::message::Message;
use crate::wire::broadcast_message;

/// Blocks receiving [`Message`]s broadcast by `master` and dispatches
/// each to a handler, until `Exit` arrives or the handler asks to
/// stop. There is no mid-operation cancellation, matching spec.md's
/// "Cancellation / timeout: none" — the only way out is `Exit`.
pub struct IoServer<'a> {
    comm: &'a SimpleCommunicator,
    master: i32,
}

impl<'a> IoServer<'a> {
    pub fn new(comm: &'a SimpleCommunicator, master: i32) -> Self {
        IoServer { comm, master }
    }

    /// Run the loop. `handler` is called with every message except
    /// `Exit`, which always terminates the loop after the handler for
    /// the *previous* message has returned.
    pub fn run(&self, mut handler: impl FnMut(Message)) {
        loop {
            let msg = broadcast_message(self.comm, self.master, None);
            if msg.is_exit() {
                log::debug!("io server: received exit, leaving message loop");
                return;
            }
            handler(msg);
        }
    }
}
