//! # gqmc
//!
//! Client library for GQ GMC Geiger counters speaking the vendor's
//! GQ-RFC1201 serial command set.
//!
//! This crate provides the pieces operator tooling needs to read device
//! state and issue control actions over a byte-oriented serial link:
//!
//! - A static registry of GQ-RFC1201 command descriptors (version, readings,
//!   clock, configuration, power control, key events)
//! - An execution engine implementing the half-duplex request/response
//!   contract with per-command framing rules and timeouts
//! - Baud-rate auto-detection that discovers the link speed by probing the
//!   version query across candidate rates
//! - A calendar codec that validates timestamps the device itself would
//!   silently accept and misdisplay
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//! - Any other transport by implementing the [`Port`] trait
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
// The example opens a real serial port, so it only compiles with the
// `native` feature.
#![cfg_attr(feature = "native", doc = "```rust,no_run")]
#![cfg_attr(not(feature = "native"), doc = "```rust,ignore")]
#![doc = r#"use gqmc::{DateTime, Device};

fn main() -> gqmc::Result<()> {
    // Open with baud auto-detection
    let mut device = Device::open("/dev/ttyUSB0", None)?;

    println!("Firmware: {}", device.version()?);
    println!("CPM: {}", device.counts_per_minute()?);

    device.set_datetime(DateTime::new(24, 1, 1, 12, 0, 0)?)?;
    device.reboot()?;

    Ok(())
}"#]
#![doc = "```"]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod baud;
pub mod device;
#[cfg(feature = "native")]
pub mod discover;
pub mod engine;
pub mod error;
pub mod port;
pub mod protocol;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use {
    discover::{DetectedPort, UsbBridge, auto_detect_port, detect_ports, find_port_by_pattern},
    port::{NativePort, NativePortEnumerator},
};
pub use {
    baud::{BAUD_CANDIDATES, Discovery, PROBE_TIMEOUT, discover},
    device::Device,
    engine::{DEFAULT_TIMEOUT, execute, execute_with_timeout},
    error::{Error, Result},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{Args, Command, DateTime, Reply, ReplyLen, all, lookup},
};
