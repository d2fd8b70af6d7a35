//! GQ-RFC1201 wire framing.
//!
//! Requests are ASCII command mnemonics, optionally followed by raw argument
//! bytes, enclosed in `<` and `>>`:
//!
//! ```text
//! +-----+-----------+----------------+------+
//! | '<' | MNEMONIC  | argument bytes | '>>' |
//! +-----+-----------+----------------+------+
//! ```
//!
//! Replies are either a fixed-length payload, a payload followed by the 0xAA
//! acknowledgement marker, or the single acknowledgement byte on its own.
//! Encoding is a pure transform over in-memory buffers; the decode helpers
//! never partially trust a malformed buffer — any framing mismatch yields
//! [`Error::Protocol`] carrying the raw bytes for diagnosis.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::protocol::datetime::DateTime;

/// Opening frame byte.
pub const FRAME_OPEN: u8 = b'<';

/// Closing frame marker.
pub const FRAME_CLOSE: &[u8] = b">>";

/// Acknowledgement byte sent by the device for write-style commands.
pub const ACK: u8 = 0xAA;

/// Length of the GETVER reply in bytes.
pub const VERSION_LEN: usize = 14;

/// Length of the GETSERIAL reply in bytes.
pub const SERIAL_NUMBER_LEN: usize = 7;

/// Length of the GETCFG reply in bytes.
pub const CONFIG_DATA_LEN: usize = 256;

/// Encode a request frame with no argument bytes.
pub fn request(mnemonic: &str) -> Vec<u8> {
    request_with_args(mnemonic, &[])
}

/// Encode a request frame with raw argument bytes after the mnemonic.
pub fn request_with_args(mnemonic: &str, args: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + mnemonic.len() + args.len() + FRAME_CLOSE.len());
    buf.push(FRAME_OPEN);
    buf.extend_from_slice(mnemonic.as_bytes());
    buf.extend_from_slice(args);
    buf.extend_from_slice(FRAME_CLOSE);
    buf
}

fn protocol_err(reason: impl Into<String>, raw: &[u8]) -> Error {
    Error::Protocol {
        reason: reason.into(),
        raw: raw.to_vec(),
    }
}

/// Decode a single-byte acknowledgement reply.
pub fn expect_ack(raw: &[u8]) -> Result<()> {
    match raw {
        [b] if *b == ACK => Ok(()),
        [b] => Err(protocol_err(
            format!("acknowledgement byte not received: {b:#04X} != {ACK:#04X}"),
            raw,
        )),
        _ => Err(protocol_err("expected a single acknowledgement byte", raw)),
    }
}

/// Check that the reply carries the 0xAA marker at its final position.
pub fn expect_marker(raw: &[u8]) -> Result<()> {
    match raw.last() {
        Some(&b) if b == ACK => Ok(()),
        Some(&b) => Err(protocol_err(
            format!("missing end marker: {b:#04X} != {ACK:#04X}"),
            raw,
        )),
        None => Err(protocol_err("empty reply", raw)),
    }
}

/// Decode a printable-ASCII text reply (version string).
///
/// Garbage received at a wrong baud rate is almost never printable ASCII, so
/// this doubles as the "recognizable version string" check during discovery.
pub fn ascii_text(raw: &[u8]) -> Result<String> {
    if !raw
        .iter()
        .all(|&b| b.is_ascii_graphic() || b == b' ')
    {
        return Err(protocol_err("reply is not printable ASCII", raw));
    }
    // Safe: validated as ASCII above.
    Ok(String::from_utf8_lossy(raw).into_owned())
}

/// Decode a big-endian u16 reply (GETCPM, heartbeat samples).
pub fn u16_be(raw: &[u8]) -> Result<u16> {
    if raw.len() != 2 {
        return Err(protocol_err("expected a 2-byte big-endian value", raw));
    }
    Ok(BigEndian::read_u16(raw))
}

/// Decode the 7-byte GETDATETIME reply: six calendar fields plus the marker.
///
/// The decoded value is not validated; a device can hold an impossible date
/// set by other means, and callers must re-check before trusting it.
pub fn datetime_reply(raw: &[u8]) -> Result<DateTime> {
    if raw.len() != 7 {
        return Err(protocol_err("expected 6 datetime fields plus marker", raw));
    }
    expect_marker(raw)?;
    Ok(DateTime::decode([
        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5],
    ]))
}

/// Decode the 4-byte GETTEMP reply.
///
/// Fields: integer part, tenths, sign flag (non-zero means negative), marker.
pub fn temperature(raw: &[u8]) -> Result<f32> {
    if raw.len() != 4 {
        return Err(protocol_err("expected 3 temperature bytes plus marker", raw));
    }
    expect_marker(raw)?;
    let mut temp = f32::from(raw[0]) + f32::from(raw[1]) / 10.0;
    if raw[2] != 0 {
        temp = -temp;
    }
    Ok(temp)
}

/// Decode the 8-byte GETGYRO reply: three big-endian axes plus the marker.
pub fn gyro(raw: &[u8]) -> Result<(u16, u16, u16)> {
    if raw.len() != 8 {
        return Err(protocol_err("expected 3 gyro axes plus marker", raw));
    }
    expect_marker(raw)?;
    Ok((
        BigEndian::read_u16(&raw[0..2]),
        BigEndian::read_u16(&raw[2..4]),
        BigEndian::read_u16(&raw[4..6]),
    ))
}

/// Render the 7-byte serial number reply as an uppercase hex string.
pub fn serial_number(raw: &[u8]) -> Result<String> {
    if raw.len() != SERIAL_NUMBER_LEN {
        return Err(protocol_err("expected a 7-byte serial number", raw));
    }
    Ok(raw.iter().map(|b| format!("{b:02X}")).collect())
}
