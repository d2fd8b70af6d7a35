//! GQ-RFC1201 protocol implementation.

pub mod commands;
pub mod datetime;
pub mod frame;

// Re-export common types
pub use commands::{Args, Command, Reply, ReplyLen, all, lookup};
pub use datetime::DateTime;
