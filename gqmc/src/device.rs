//! High-level device handle.
//!
//! [`Device`] owns one open port for its whole lifetime and exposes one
//! typed method per registered command. It is pure delegation: every method
//! forwards to the execution engine and unwraps the reply into its natural
//! type. The port is released when the handle goes out of scope on any exit
//! path; [`Device::close`] exists for callers that want the error.
//!
//! The protocol is half-duplex, so the handle requires `&mut self` for every
//! command — concurrent commands on one device are serialized by the borrow
//! checker, and independent devices on distinct ports run fully in parallel.

use std::time::Duration;

use crate::engine;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::commands::{self, Args, Reply, ReplyLen};
use crate::protocol::datetime::DateTime;
use crate::protocol::frame;

/// Heartbeat samples carry the count in the low 14 bits.
pub const HEARTBEAT_COUNT_MASK: u16 = 0x3FFF;

/// Handle to one GQ counter over one open port.
pub struct Device<P: Port> {
    port: P,
}

impl<P: Port> Device<P> {
    /// Wrap an already-open port.
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the handle and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Close the port explicitly, surfacing any release error.
    ///
    /// Dropping the handle releases the port too; this is for callers that
    /// want to observe the outcome.
    pub fn close(mut self) -> Result<()> {
        self.port.close()
    }

    fn run(&mut self, cmd: &commands::Command, args: &Args) -> Result<Reply> {
        engine::execute(&mut self.port, cmd, args)
    }

    /// Get the hardware model and firmware version string.
    pub fn version(&mut self) -> Result<String> {
        match self.run(&commands::GETVER, &Args::None)? {
            Reply::Text(v) => Ok(v),
            other => Err(unexpected(other)),
        }
    }

    /// Get the current counts-per-minute reading.
    pub fn counts_per_minute(&mut self) -> Result<u16> {
        match self.run(&commands::GETCPM, &Args::None)? {
            Reply::Count(cpm) => Ok(cpm),
            other => Err(unexpected(other)),
        }
    }

    /// Get the battery voltage in tenths of a volt.
    pub fn voltage(&mut self) -> Result<u8> {
        match self.run(&commands::GETVOLT, &Args::None)? {
            Reply::Byte(v) => Ok(v),
            other => Err(unexpected(other)),
        }
    }

    /// Read the 256-byte configuration block.
    pub fn configuration(&mut self) -> Result<Vec<u8>> {
        match self.run(&commands::GETCFG, &Args::None)? {
            Reply::Raw(data) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Erase all configuration data.
    pub fn erase_configuration(&mut self) -> Result<()> {
        self.run(&commands::ECFG, &Args::None).map(drop)
    }

    /// Write a single configuration byte.
    pub fn write_configuration(&mut self, addr: u8, value: u8) -> Result<()> {
        self.run(&commands::WCFG, &Args::ConfigWrite { addr, value })
            .map(drop)
    }

    /// Reload the configuration from flash into working memory.
    pub fn update_configuration(&mut self) -> Result<()> {
        self.run(&commands::CFGUPDATE, &Args::None).map(drop)
    }

    /// Get the unit serial number as an uppercase hex string.
    pub fn serial_number(&mut self) -> Result<String> {
        match self.run(&commands::GETSERIAL, &Args::None)? {
            Reply::Text(serial) => Ok(serial),
            other => Err(unexpected(other)),
        }
    }

    /// Read the real-time clock.
    ///
    /// The returned value is not validated; the device will hold whatever it
    /// was last set to, including impossible dates. Re-check with
    /// [`DateTime::validate`] before trusting it.
    pub fn datetime(&mut self) -> Result<DateTime> {
        match self.run(&commands::GETDATETIME, &Args::None)? {
            Reply::DateTime(dt) => Ok(dt),
            other => Err(unexpected(other)),
        }
    }

    /// Set the real-time clock in one command.
    pub fn set_datetime(&mut self, dt: DateTime) -> Result<()> {
        self.run(&commands::SETDATETIME, &Args::DateTime(dt))
            .map(drop)
    }

    /// Set the clock year (2-digit, 2000 century).
    pub fn set_year(&mut self, year: u8) -> Result<()> {
        self.run(&commands::SETDATEYY, &Args::Byte(year)).map(drop)
    }

    /// Set the clock month.
    pub fn set_month(&mut self, month: u8) -> Result<()> {
        self.run(&commands::SETDATEMM, &Args::Byte(month)).map(drop)
    }

    /// Set the clock day of month.
    pub fn set_day(&mut self, day: u8) -> Result<()> {
        self.run(&commands::SETDATEDD, &Args::Byte(day)).map(drop)
    }

    /// Set the clock hour.
    pub fn set_hour(&mut self, hour: u8) -> Result<()> {
        self.run(&commands::SETTIMEHH, &Args::Byte(hour)).map(drop)
    }

    /// Set the clock minute.
    pub fn set_minute(&mut self, minute: u8) -> Result<()> {
        self.run(&commands::SETTIMEMM, &Args::Byte(minute)).map(drop)
    }

    /// Set the clock second.
    pub fn set_second(&mut self, second: u8) -> Result<()> {
        self.run(&commands::SETTIMESS, &Args::Byte(second)).map(drop)
    }

    /// Read the temperature sensor in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32> {
        match self.run(&commands::GETTEMP, &Args::None)? {
            Reply::Temperature(t) => Ok(t),
            other => Err(unexpected(other)),
        }
    }

    /// Read the gyroscope axes.
    pub fn gyro(&mut self) -> Result<(u16, u16, u16)> {
        match self.run(&commands::GETGYRO, &Args::None)? {
            Reply::Gyro { x, y, z } => Ok((x, y, z)),
            other => Err(unexpected(other)),
        }
    }

    /// Read `len` bytes of history data from internal flash at `addr`.
    pub fn read_history(&mut self, addr: u32, len: u16) -> Result<Vec<u8>> {
        match self.run(&commands::SPIR, &Args::Read { addr, len })? {
            Reply::Raw(data) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Simulate a front-panel key press (soft keys 0-3).
    pub fn send_key(&mut self, key: u8) -> Result<()> {
        self.run(&commands::SENDKEY, &Args::Key(key)).map(drop)
    }

    /// Reboot the unit.
    pub fn reboot(&mut self) -> Result<()> {
        self.run(&commands::REBOOT, &Args::None).map(drop)
    }

    /// Power the unit off.
    pub fn power_off(&mut self) -> Result<()> {
        self.run(&commands::POWEROFF, &Args::None).map(drop)
    }

    /// Power the unit on.
    pub fn power_on(&mut self) -> Result<()> {
        self.run(&commands::POWERON, &Args::None).map(drop)
    }

    /// Reset the unit to factory defaults.
    pub fn factory_reset(&mut self) -> Result<()> {
        self.run(&commands::FACTORYRESET, &Args::None).map(drop)
    }

    /// Enable the once-per-second CPS heartbeat stream.
    ///
    /// While the stream is running the device interleaves samples with
    /// command replies; drain it with [`Device::read_heartbeat`] and turn it
    /// off before issuing other commands.
    pub fn heartbeat_on(&mut self) -> Result<()> {
        self.run(&commands::HEARTBEAT_ON, &Args::None).map(drop)
    }

    /// Disable the heartbeat stream and drop any queued samples.
    pub fn heartbeat_off(&mut self) -> Result<()> {
        self.run(&commands::HEARTBEAT_OFF, &Args::None)?;
        self.port.clear_buffers()
    }

    /// Block for the next heartbeat sample (counts in the last second).
    pub fn read_heartbeat(&mut self, timeout: Duration) -> Result<u16> {
        let raw = engine::read_reply(&mut self.port, ReplyLen::Exact(2), timeout)?;
        Ok(frame::u16_be(&raw)? & HEARTBEAT_COUNT_MASK)
    }
}

fn unexpected(reply: Reply) -> Error {
    Error::Protocol {
        reason: format!("unexpected reply shape: {reply:?}"),
        raw: Vec::new(),
    }
}

// Native-specific convenience functions
#[cfg(feature = "native")]
mod native_impl {
    use log::debug;

    use super::{Device, Result};
    use crate::baud;
    use crate::port::NativePort;

    impl Device<NativePort> {
        /// Open a serial port and wrap it in a device handle.
        ///
        /// With an explicit baud rate the port is used as-is. Without one,
        /// baud discovery probes the candidate rates and leaves the port at
        /// the discovered speed.
        pub fn open(port_name: &str, baud_rate: Option<u32>) -> Result<Self> {
            match baud_rate {
                Some(rate) => {
                    let port = NativePort::open_simple(port_name, rate)?;
                    Ok(Self::from_port(port))
                },
                None => {
                    let mut port =
                        NativePort::open_simple(port_name, baud::BAUD_CANDIDATES[0])?;
                    let rate = baud::discover(&mut port)?;
                    debug!("Opened {port_name} at {rate} baud");
                    Ok(Self::from_port(port))
                },
            }
        }
    }
}
