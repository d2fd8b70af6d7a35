//! GQ-RFC1201 command registry.
//!
//! Every command the protocol defines is described by an immutable
//! [`Command`] descriptor: a mnemonic plus plain function pointers for
//! argument validation, request encoding, and reply decoding, and a framing
//! rule for the expected reply length. Descriptors are process-wide statics
//! with no interior state, so they are shared freely across threads and
//! across executions against different ports.
//!
//! The registry is indexed once on first lookup; registering two commands
//! under the same mnemonic is a configuration error caught at that point,
//! never at call time.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::protocol::datetime::DateTime;
use crate::protocol::frame;

/// Typed arguments for a command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Args {
    /// No arguments.
    None,
    /// A single raw byte (the SETDATEXX / SETTIMEXX family).
    Byte(u8),
    /// A soft-key index for SENDKEY.
    Key(u8),
    /// A configuration write for WCFG.
    ConfigWrite {
        /// Configuration address (0–255).
        addr: u8,
        /// Byte to store.
        value: u8,
    },
    /// A history-flash read for SPIR.
    Read {
        /// Flash address, 3 bytes on the wire (0–0xFFFFFF).
        addr: u32,
        /// Number of bytes to read back.
        len: u16,
    },
    /// A full timestamp for SETDATETIME.
    DateTime(DateTime),
}

/// Typed outcome of a successful command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing, or a consumed acknowledgement byte.
    Empty,
    /// Printable-ASCII text (version string, serial number).
    Text(String),
    /// A 16-bit counter reading.
    Count(u16),
    /// A single raw byte (battery voltage in tenths of a volt).
    Byte(u8),
    /// Raw payload bytes (configuration dump, history flash).
    Raw(Vec<u8>),
    /// A decoded, unvalidated timestamp.
    DateTime(DateTime),
    /// Temperature in degrees Celsius.
    Temperature(f32),
    /// Gyroscope axes.
    Gyro {
        /// X axis.
        x: u16,
        /// Y axis.
        y: u16,
        /// Z axis.
        z: u16,
    },
}

/// Expected reply length for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLen {
    /// The device sends nothing back.
    None,
    /// Exactly this many bytes.
    Exact(usize),
    /// At least this many bytes; the engine returns as soon as that many
    /// have arrived.
    AtLeast(usize),
}

/// Immutable command descriptor.
///
/// A table entry, not an object: behavior is carried by plain function
/// pointers so the whole registry lives in read-only statics with no
/// dynamic dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// Unique command mnemonic as it appears on the wire.
    pub name: &'static str,
    /// Human-readable description for tooling/help output.
    pub description: &'static str,
    /// Earliest firmware revision implementing the command.
    pub firmware: &'static str,
    /// Argument precondition; runs before any byte leaves the process.
    pub validate: fn(&Args) -> Result<()>,
    /// Pure request encoder; total over validated arguments.
    pub encode: fn(&Command, &Args) -> Vec<u8>,
    /// Reply framing rule, possibly argument-dependent (SPIR).
    pub reply_len: fn(&Args) -> ReplyLen,
    /// Reply decoder; rejects any buffer that mismatches the framing.
    pub decode: fn(&[u8]) -> Result<Reply>,
    /// Per-command timeout override; `None` uses the engine default.
    pub timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Validators

fn no_args(args: &Args) -> Result<()> {
    match args {
        Args::None => Ok(()),
        other => Err(Error::validation(
            "args",
            format!("command takes no arguments, got {other:?}"),
        )),
    }
}

fn key_code(args: &Args) -> Result<()> {
    match args {
        Args::Key(k) if *k <= 3 => Ok(()),
        Args::Key(k) => Err(Error::validation(
            "key",
            format!("{k} is not a valid soft-key index (0-3)"),
        )),
        other => Err(Error::validation(
            "args",
            format!("expected a key index, got {other:?}"),
        )),
    }
}

fn byte_within<const LO: u8, const HI: u8>(args: &Args) -> Result<()> {
    match args {
        Args::Byte(b) if (LO..=HI).contains(b) => Ok(()),
        Args::Byte(b) => Err(Error::validation(
            "value",
            format!("{b} is not in {LO}-{HI}"),
        )),
        other => Err(Error::validation(
            "args",
            format!("expected a byte value, got {other:?}"),
        )),
    }
}

fn config_write(args: &Args) -> Result<()> {
    match args {
        // Address and value are full-byte fields, nothing further to check.
        Args::ConfigWrite { .. } => Ok(()),
        other => Err(Error::validation(
            "args",
            format!("expected a configuration write, got {other:?}"),
        )),
    }
}

fn history_read(args: &Args) -> Result<()> {
    match args {
        Args::Read { addr, .. } if *addr <= 0x00FF_FFFF => Ok(()),
        Args::Read { addr, .. } => Err(Error::validation(
            "addr",
            format!("{addr:#X} does not fit the 3-byte address field"),
        )),
        other => Err(Error::validation(
            "args",
            format!("expected a history read, got {other:?}"),
        )),
    }
}

fn datetime_value(args: &Args) -> Result<()> {
    match args {
        Args::DateTime(dt) => dt.validate(),
        other => Err(Error::validation(
            "args",
            format!("expected a datetime, got {other:?}"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Encoders
//
// Encoders run only after the command's validator accepted the arguments,
// so the argument shape is already pinned down.

fn encode_plain(cmd: &Command, _args: &Args) -> Vec<u8> {
    frame::request(cmd.name)
}

fn encode_byte(cmd: &Command, args: &Args) -> Vec<u8> {
    match args {
        Args::Byte(b) => frame::request_with_args(cmd.name, &[*b]),
        _ => unreachable!("argument shape is checked by validate"),
    }
}

fn encode_key(cmd: &Command, args: &Args) -> Vec<u8> {
    match args {
        Args::Key(k) => frame::request_with_args(cmd.name, &[*k]),
        _ => unreachable!("argument shape is checked by validate"),
    }
}

fn encode_config_write(cmd: &Command, args: &Args) -> Vec<u8> {
    match args {
        Args::ConfigWrite { addr, value } => {
            frame::request_with_args(cmd.name, &[*addr, *value])
        },
        _ => unreachable!("argument shape is checked by validate"),
    }
}

#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
fn encode_read(cmd: &Command, args: &Args) -> Vec<u8> {
    match args {
        Args::Read { addr, len } => {
            // A2 A1 A0 (MSB first), then L1 L0
            let mut field = Vec::with_capacity(5);
            field.write_u24::<BigEndian>(*addr).unwrap();
            field.write_u16::<BigEndian>(*len).unwrap();
            frame::request_with_args(cmd.name, &field)
        },
        _ => unreachable!("argument shape is checked by validate"),
    }
}

fn encode_datetime(cmd: &Command, args: &Args) -> Vec<u8> {
    match args {
        Args::DateTime(dt) => frame::request_with_args(cmd.name, &dt.encode()),
        _ => unreachable!("argument shape is checked by validate"),
    }
}

// ---------------------------------------------------------------------------
// Reply framing rules

fn reply_none(_args: &Args) -> ReplyLen {
    ReplyLen::None
}

fn reply_exact<const N: usize>(_args: &Args) -> ReplyLen {
    ReplyLen::Exact(N)
}

fn reply_read_len(args: &Args) -> ReplyLen {
    match args {
        Args::Read { len, .. } => ReplyLen::Exact(usize::from(*len)),
        _ => ReplyLen::None,
    }
}

// ---------------------------------------------------------------------------
// Decoders

fn decode_empty(_raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Empty)
}

fn decode_ack(raw: &[u8]) -> Result<Reply> {
    frame::expect_ack(raw)?;
    Ok(Reply::Empty)
}

fn decode_version(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Text(frame::ascii_text(raw)?))
}

fn decode_count(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Count(frame::u16_be(raw)?))
}

fn decode_volt(raw: &[u8]) -> Result<Reply> {
    match raw {
        [b] => Ok(Reply::Byte(*b)),
        _ => Err(Error::Protocol {
            reason: "expected a single voltage byte".into(),
            raw: raw.to_vec(),
        }),
    }
}

fn decode_raw(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Raw(raw.to_vec()))
}

fn decode_serial(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Text(frame::serial_number(raw)?))
}

fn decode_datetime(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::DateTime(frame::datetime_reply(raw)?))
}

fn decode_temperature(raw: &[u8]) -> Result<Reply> {
    Ok(Reply::Temperature(frame::temperature(raw)?))
}

fn decode_gyro(raw: &[u8]) -> Result<Reply> {
    let (x, y, z) = frame::gyro(raw)?;
    Ok(Reply::Gyro { x, y, z })
}

// ---------------------------------------------------------------------------
// Descriptors

/// Get hardware model and version.
pub static GETVER: Command = Command {
    name: "GETVER",
    description: "Get hardware model and version",
    firmware: "GMC-280, GMC-300 Re.2.0x or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<{ frame::VERSION_LEN }>,
    decode: decode_version,
    timeout: None,
};

/// Get the current CPM (counts per minute) reading.
pub static GETCPM: Command = Command {
    name: "GETCPM",
    description: "Get current CPM value",
    firmware: "GMC-280, GMC-300 Re.2.0x or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<2>,
    decode: decode_count,
    timeout: None,
};

/// Enable the once-per-second CPS heartbeat stream.
pub static HEARTBEAT_ON: Command = Command {
    name: "HEARTBEAT1",
    description: "Enable the 1 Hz CPS heartbeat stream",
    firmware: "GMC-280, GMC-300 Re.2.0x or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Disable the heartbeat stream.
pub static HEARTBEAT_OFF: Command = Command {
    name: "HEARTBEAT0",
    description: "Disable the 1 Hz CPS heartbeat stream",
    firmware: "GMC-280, GMC-300 Re.2.0x or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Get the battery voltage (one byte, tenths of a volt).
pub static GETVOLT: Command = Command {
    name: "GETVOLT",
    description: "Get battery voltage (tenths of a volt)",
    firmware: "GMC-280, GMC-300 Re.2.0x or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<1>,
    decode: decode_volt,
    timeout: None,
};

/// Read history data from internal flash.
pub static SPIR: Command = Command {
    name: "SPIR",
    description: "Read history data from internal flash",
    firmware: "GMC-300 Re.2.0x or later",
    validate: history_read,
    encode: encode_read,
    reply_len: reply_read_len,
    decode: decode_raw,
    timeout: Some(Duration::from_secs(3)),
};

/// Read the full 256-byte configuration block.
pub static GETCFG: Command = Command {
    name: "GETCFG",
    description: "Read the 256-byte configuration block",
    firmware: "GMC-280, GMC-300 Re.2.10 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<{ frame::CONFIG_DATA_LEN }>,
    decode: decode_raw,
    timeout: Some(Duration::from_secs(3)),
};

/// Erase all configuration data.
pub static ECFG: Command = Command {
    name: "ECFG",
    description: "Erase all configuration data",
    firmware: "GMC-280, GMC-300 Re.2.10 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: Some(Duration::from_secs(5)),
};

/// Write one configuration byte.
pub static WCFG: Command = Command {
    name: "WCFG",
    description: "Write one configuration byte",
    firmware: "GMC-280, GMC-300 Re.2.10 or later",
    validate: config_write,
    encode: encode_config_write,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Get the 7-byte serial number.
pub static GETSERIAL: Command = Command {
    name: "GETSERIAL",
    description: "Get the unit serial number",
    firmware: "GMC-280, GMC-300 Re.2.11 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<{ frame::SERIAL_NUMBER_LEN }>,
    decode: decode_serial,
    timeout: None,
};

/// Power the unit off. No reply.
pub static POWEROFF: Command = Command {
    name: "POWEROFF",
    description: "Power off",
    firmware: "GMC-280, GMC-300 Re.2.11 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Reload configuration from flash into RAM.
pub static CFGUPDATE: Command = Command {
    name: "CFGUPDATE",
    description: "Reload/refresh configuration",
    firmware: "GMC-280, GMC-300 Re.2.20 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Reset the unit to factory defaults.
pub static FACTORYRESET: Command = Command {
    name: "FACTORYRESET",
    description: "Reset unit to factory default",
    firmware: "GMC-280, GMC-300 Re.3.00 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: Some(Duration::from_secs(5)),
};

/// Reboot the unit. No reply.
pub static REBOOT: Command = Command {
    name: "REBOOT",
    description: "Reboot unit",
    firmware: "GMC-280, GMC-300 Re.3.00 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Read the real-time clock.
pub static GETDATETIME: Command = Command {
    name: "GETDATETIME",
    description: "Get date and time",
    firmware: "GMC-280, GMC-300 Re.3.00 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<7>,
    decode: decode_datetime,
    timeout: None,
};

/// Read the temperature sensor.
pub static GETTEMP: Command = Command {
    name: "GETTEMP",
    description: "Get temperature",
    firmware: "GMC-320 Re.3.01 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<4>,
    decode: decode_temperature,
    timeout: None,
};

/// Power the unit on. No reply.
pub static POWERON: Command = Command {
    name: "POWERON",
    description: "Power on",
    firmware: "GMC-280, GMC-300, GMC-320 Re.3.10 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Read the gyroscope.
pub static GETGYRO: Command = Command {
    name: "GETGYRO",
    description: "Get gyroscope data",
    firmware: "GMC-320 Re.3.01 or later",
    validate: no_args,
    encode: encode_plain,
    reply_len: reply_exact::<8>,
    decode: decode_gyro,
    timeout: None,
};

/// Simulate a front-panel key press. No reply.
pub static SENDKEY: Command = Command {
    name: "SENDKEY",
    description: "Send a key press to the unit",
    firmware: "GMC-300 Re.2.0x or later",
    validate: key_code,
    encode: encode_key,
    reply_len: reply_none,
    decode: decode_empty,
    timeout: None,
};

/// Set the clock year (2-digit).
pub static SETDATEYY: Command = Command {
    name: "SETDATEYY",
    description: "Set realtime clock year",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<0, 99>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the clock month.
pub static SETDATEMM: Command = Command {
    name: "SETDATEMM",
    description: "Set realtime clock month",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<1, 12>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the clock day of month.
pub static SETDATEDD: Command = Command {
    name: "SETDATEDD",
    description: "Set realtime clock day",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<1, 31>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the clock hour.
pub static SETTIMEHH: Command = Command {
    name: "SETTIMEHH",
    description: "Set realtime clock hour",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<0, 23>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the clock minute.
pub static SETTIMEMM: Command = Command {
    name: "SETTIMEMM",
    description: "Set realtime clock minute",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<0, 59>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the clock second.
pub static SETTIMESS: Command = Command {
    name: "SETTIMESS",
    description: "Set realtime clock second",
    firmware: "GMC-280, GMC-300 Re.2.23 or later",
    validate: byte_within::<0, 59>,
    encode: encode_byte,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Set the full real-time clock in one command.
pub static SETDATETIME: Command = Command {
    name: "SETDATETIME",
    description: "Set date and time",
    firmware: "GMC-280, GMC-300 Re.3.00 or later",
    validate: datetime_value,
    encode: encode_datetime,
    reply_len: reply_exact::<1>,
    decode: decode_ack,
    timeout: None,
};

/// Every registered command, in registration order.
pub static COMMANDS: &[&Command] = &[
    &GETVER,
    &GETCPM,
    &HEARTBEAT_ON,
    &HEARTBEAT_OFF,
    &GETVOLT,
    &SPIR,
    &GETCFG,
    &ECFG,
    &WCFG,
    &GETSERIAL,
    &POWEROFF,
    &CFGUPDATE,
    &FACTORYRESET,
    &REBOOT,
    &GETDATETIME,
    &GETTEMP,
    &POWERON,
    &GETGYRO,
    &SENDKEY,
    &SETDATEYY,
    &SETDATEMM,
    &SETDATEDD,
    &SETTIMEHH,
    &SETTIMEMM,
    &SETTIMESS,
    &SETDATETIME,
];

static INDEX: OnceLock<HashMap<&'static str, &'static Command>> = OnceLock::new();

fn index() -> &'static HashMap<&'static str, &'static Command> {
    INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(COMMANDS.len());
        for cmd in COMMANDS {
            // Two descriptors under one mnemonic is a build-out mistake, not
            // a runtime condition.
            assert!(
                map.insert(cmd.name, *cmd).is_none(),
                "duplicate command registered: {}",
                cmd.name
            );
        }
        map
    })
}

/// Look up a command descriptor by its mnemonic.
pub fn lookup(name: &str) -> Option<&'static Command> {
    index().get(name.to_ascii_uppercase().as_str()).copied()
}

/// Enumerate all registered commands, in registration order.
pub fn all() -> impl Iterator<Item = &'static Command> {
    COMMANDS.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_no_duplicates() {
        // Building the index asserts uniqueness.
        assert_eq!(index().len(), COMMANDS.len());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("getver").unwrap().name, "GETVER");
        assert_eq!(lookup("GETVER").unwrap().name, "GETVER");
        assert!(lookup("NOSUCH").is_none());
    }

    #[test]
    fn test_enumeration_covers_full_surface() {
        let names: Vec<_> = all().map(|c| c.name).collect();
        assert_eq!(names.len(), 26);
        assert!(names.contains(&"SETDATETIME"));
        assert!(names.contains(&"HEARTBEAT0"));
    }

    #[test]
    fn test_plain_command_encoding() {
        let frame = (GETVER.encode)(&GETVER, &Args::None);
        assert_eq!(frame, b"<GETVER>>");
    }

    #[test]
    fn test_sendkey_validation_and_encoding() {
        assert!((SENDKEY.validate)(&Args::Key(3)).is_ok());
        assert!((SENDKEY.validate)(&Args::Key(4)).is_err());
        assert!((SENDKEY.validate)(&Args::None).is_err());

        let frame = (SENDKEY.encode)(&SENDKEY, &Args::Key(1));
        assert_eq!(frame, b"<SENDKEY\x01>>");
    }

    #[test]
    fn test_spir_encoding_is_big_endian() {
        let args = Args::Read {
            addr: 0x012345,
            len: 0x0800,
        };
        (SPIR.validate)(&args).unwrap();
        let frame = (SPIR.encode)(&SPIR, &args);
        assert_eq!(frame, b"<SPIR\x01\x23\x45\x08\x00>>");
        assert_eq!((SPIR.reply_len)(&args), ReplyLen::Exact(0x0800));
    }

    #[test]
    fn test_spir_address_bounds() {
        assert!(
            (SPIR.validate)(&Args::Read {
                addr: 0x0100_0000,
                len: 1
            })
            .is_err()
        );
    }

    #[test]
    fn test_wcfg_encoding() {
        let args = Args::ConfigWrite {
            addr: 0x08,
            value: 0xC0,
        };
        (WCFG.validate)(&args).unwrap();
        let frame = (WCFG.encode)(&WCFG, &args);
        assert_eq!(frame, b"<WCFG\x08\xC0>>");
    }

    #[test]
    fn test_setdatetime_rejects_before_encoding() {
        let bad = Args::DateTime(DateTime {
            year: 24,
            month: 2,
            day: 30,
            hour: 0,
            minute: 0,
            second: 0,
        });
        assert!((SETDATETIME.validate)(&bad).is_err());
    }

    #[test]
    fn test_setdatetime_encoding() {
        let dt = DateTime::new(24, 1, 1, 0, 0, 0).unwrap();
        let args = Args::DateTime(dt);
        (SETDATETIME.validate)(&args).unwrap();
        let frame = (SETDATETIME.encode)(&SETDATETIME, &args);
        assert_eq!(frame, b"<SETDATETIME\x18\x01\x01\x00\x00\x00>>");
    }

    #[test]
    fn test_clock_field_ranges() {
        assert!((SETDATEMM.validate)(&Args::Byte(12)).is_ok());
        assert!((SETDATEMM.validate)(&Args::Byte(0)).is_err());
        assert!((SETDATEMM.validate)(&Args::Byte(13)).is_err());
        assert!((SETTIMEHH.validate)(&Args::Byte(24)).is_err());
        assert!((SETTIMESS.validate)(&Args::Byte(60)).is_err());
        assert!((SETDATEYY.validate)(&Args::Byte(100)).is_err());
    }

    #[test]
    fn test_fire_and_forget_commands_expect_no_reply() {
        for cmd in [&REBOOT, &POWEROFF, &POWERON, &SENDKEY, &HEARTBEAT_ON] {
            assert_eq!((cmd.reply_len)(&Args::None), ReplyLen::None);
        }
    }
}
