//! Error types for gqmc.

use std::io;
use thiserror::Error;

/// Result type for gqmc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gqmc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied arguments violate a command's precondition.
    ///
    /// Raised before any byte is written to the transport.
    #[error("Invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No reply (not a single byte) within the command's time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A reply was received but did not match the expected framing.
    ///
    /// Carries whatever bytes were read; a partial frame is evidence of a
    /// wrong baud rate or device desync, so it is never discarded.
    #[error("Protocol error: {reason} (raw: {raw:02X?})")]
    Protocol {
        /// What was wrong with the reply.
        reason: String,
        /// The raw bytes received so far.
        raw: Vec<u8>,
    },

    /// Baud discovery exhausted every candidate rate without a reply.
    #[error("Could not determine device baud rate")]
    BaudNotFound,

    /// No usable serial port was found during discovery.
    #[error("Device not found")]
    DeviceNotFound,

    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] value.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
