//! Asynchronous I/O-service split (C10): a dedicated group of I/O
//! tasks serving one or more compute components over a message loop,
//! instead of every compute rank also doing I/O.
//!
//! Reference: spec.md §4.6, §REDESIGN FLAGS "Async control flow".

pub mod client;
pub mod dispatch;
pub mod message;
pub mod server;
mod wire;

pub use client::IoClient;
pub use message::Message;
pub use server::IoServer;
