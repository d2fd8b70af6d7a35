//! Command execution engine.
//!
//! One command round trip is: validate arguments, encode the request, write
//! it in one logical write, then collect the reply under a deadline and hand
//! the buffer to the command's decoder. The protocol is strictly half-duplex
//! request/response, so the engine assumes exclusive access to the port for
//! the duration of the call (it borrows it mutably) and never pipelines.
//!
//! The engine performs no retries. A timed-out or malformed reply is
//! reported to the caller as-is; retry policy belongs to the caller, and
//! baud discovery layers its own bounded probing on top of this path.

use std::time::{Duration, Instant};

use log::trace;

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::commands::{Args, Command, Reply, ReplyLen};

/// Default time budget for a command round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Port poll slice while waiting for reply bytes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute a command with its own timeout (or the engine default).
pub fn execute<P: Port>(port: &mut P, cmd: &Command, args: &Args) -> Result<Reply> {
    execute_with_timeout(port, cmd, args, cmd.timeout.unwrap_or(DEFAULT_TIMEOUT))
}

/// Execute a command with an explicit time budget.
///
/// Arguments are validated before any byte is written; on validation failure
/// the transport is never touched. A deadline with zero bytes received maps
/// to [`Error::Timeout`]; a deadline with a partial buffer maps to
/// [`Error::Protocol`] carrying the bytes, since partial frames are evidence
/// of a wrong baud rate or device desync.
pub fn execute_with_timeout<P: Port>(
    port: &mut P,
    cmd: &Command,
    args: &Args,
    timeout: Duration,
) -> Result<Reply> {
    (cmd.validate)(args)?;

    let request = (cmd.encode)(cmd, args);
    trace!("{} > {request:02X?}", port.name());

    // Stale bytes from an aborted exchange or a running heartbeat stream
    // must not be mistaken for this command's reply.
    port.clear_buffers()?;
    port.write_all_bytes(&request)?;

    let rule = (cmd.reply_len)(args);
    if rule == ReplyLen::None {
        return Ok(Reply::Empty);
    }

    let raw = read_reply(port, rule, timeout)?;
    trace!("{} < {raw:02X?}", port.name());
    (cmd.decode)(&raw)
}

/// Collect a reply under a deadline according to the framing rule.
///
/// The port is polled in short slices so the deadline is honored regardless
/// of the port's configured timeout; the configured timeout is restored
/// afterwards.
pub(crate) fn read_reply<P: Port>(
    port: &mut P,
    rule: ReplyLen,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let (want, exact) = match rule {
        ReplyLen::None => return Ok(Vec::new()),
        ReplyLen::Exact(n) => (n, true),
        ReplyLen::AtLeast(n) => (n, false),
    };

    let previous = port.timeout();
    port.set_timeout(POLL_INTERVAL.min(timeout))?;
    let collected = collect(port, want, exact, timeout);
    port.set_timeout(previous)?;

    let buf = collected?;
    if exact && buf.len() == want {
        return Ok(buf);
    }
    if !exact && buf.len() >= want {
        return Ok(buf);
    }
    if buf.is_empty() {
        return Err(Error::Timeout(format!(
            "no reply within {}ms",
            timeout.as_millis()
        )));
    }
    Err(Error::Protocol {
        reason: format!("short reply: got {} of {want} expected bytes", buf.len()),
        raw: buf,
    })
}

fn collect<P: Port>(port: &mut P, want: usize, exact: bool, timeout: Duration) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::with_capacity(want);
    let mut chunk = [0u8; 64];

    while Instant::now() < deadline {
        // Both rules are satisfied at `want`; only the exact rule also caps
        // how much may be consumed.
        if buf.len() >= want {
            break;
        }

        // Never consume past an exact frame; surplus bytes (a heartbeat
        // stream, a desynced device) stay queued for diagnosis.
        let room = if exact {
            (want - buf.len()).min(chunk.len())
        } else {
            chunk.len()
        };

        match port.read(&mut chunk[..room]) {
            Ok(0) => {},
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock => {},
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::{GETCPM, GETVER, REBOOT, SENDKEY, SETDATETIME};
    use crate::protocol::datetime::DateTime;
    use std::collections::VecDeque;
    use std::io::{Read, Write};

    /// In-memory port: a canned reply and a log of written requests.
    struct MockPort {
        reply: VecDeque<u8>,
        written: Vec<u8>,
        timeout: Duration,
        baud: u32,
    }

    impl MockPort {
        fn with_reply(reply: &[u8]) -> Self {
            Self {
                reply: reply.iter().copied().collect(),
                written: Vec::new(),
                timeout: Duration::from_millis(50),
                baud: 115200,
            }
        }

        fn silent() -> Self {
            Self::with_reply(&[])
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.reply.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"));
            }
            let n = buf.len().min(self.reply.len());
            for slot in &mut buf[..n] {
                *slot = self.reply.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for MockPort {
        fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn set_baud_rate(&mut self, baud_rate: u32) -> crate::Result<()> {
            self.baud = baud_rate;
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            self.baud
        }

        fn clear_buffers(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn close(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    const FAST: Duration = Duration::from_millis(40);

    #[test]
    fn test_version_query_round_trip() {
        let mut port = MockPort::with_reply(b"GMC-300Re 4.54");
        let reply = execute(&mut port, &GETVER, &Args::None).unwrap();
        assert_eq!(port.written, b"<GETVER>>");
        assert_eq!(reply, Reply::Text("GMC-300Re 4.54".into()));
    }

    #[test]
    fn test_cpm_round_trip() {
        let mut port = MockPort::with_reply(&[0x00, 0x3C]);
        let reply = execute(&mut port, &GETCPM, &Args::None).unwrap();
        assert_eq!(reply, Reply::Count(60));
    }

    #[test]
    fn test_validation_failure_never_touches_the_port() {
        let mut port = MockPort::silent();
        let err = execute(&mut port, &SENDKEY, &Args::Key(9)).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "key", .. }));
        assert!(port.written.is_empty());
    }

    #[test]
    fn test_no_reply_maps_to_timeout() {
        let mut port = MockPort::silent();
        let err = execute_with_timeout(&mut port, &GETVER, &Args::None, FAST).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_short_reply_maps_to_protocol_error_with_bytes() {
        // 5 of the 14 expected version bytes
        let mut port = MockPort::with_reply(b"GMC-3");
        let err = execute_with_timeout(&mut port, &GETVER, &Args::None, FAST).unwrap_err();
        match err {
            Error::Protocol { raw, .. } => assert_eq!(raw, b"GMC-3"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fire_and_forget_returns_immediately() {
        let mut port = MockPort::silent();
        let reply = execute(&mut port, &REBOOT, &Args::None).unwrap();
        assert_eq!(reply, Reply::Empty);
        assert_eq!(port.written, b"<REBOOT>>");
    }

    #[test]
    fn test_exact_read_leaves_surplus_bytes_queued() {
        // Ack followed by the start of a heartbeat stream
        let mut port = MockPort::with_reply(&[0xAA, 0x00, 0x1F]);
        let dt = DateTime::new(24, 1, 1, 0, 0, 0).unwrap();
        let reply = execute(&mut port, &SETDATETIME, &Args::DateTime(dt)).unwrap();
        assert_eq!(reply, Reply::Empty);
        assert_eq!(port.reply.len(), 2);
    }

    #[test]
    fn test_port_timeout_restored_after_read() {
        let mut port = MockPort::with_reply(b"GMC-300Re 4.54");
        port.timeout = Duration::from_secs(7);
        execute(&mut port, &GETVER, &Args::None).unwrap();
        assert_eq!(port.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_at_least_rule_accepts_longer_reply() {
        fn min_four(_args: &Args) -> ReplyLen {
            ReplyLen::AtLeast(4)
        }
        let cmd = Command {
            reply_len: min_four,
            ..GETCFG_LIKE
        };
        let mut port = MockPort::with_reply(&[1, 2, 3, 4, 5, 6]);
        let reply = execute_with_timeout(&mut port, &cmd, &Args::None, FAST).unwrap();
        assert_eq!(reply, Reply::Raw(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_at_least_rule_returns_once_minimum_is_met() {
        fn min_four(_args: &Args) -> ReplyLen {
            ReplyLen::AtLeast(4)
        }
        let cmd = Command {
            reply_len: min_four,
            ..GETCFG_LIKE
        };
        let mut port = MockPort::with_reply(&[1, 2, 3, 4]);
        let started = Instant::now();
        let reply =
            execute_with_timeout(&mut port, &cmd, &Args::None, Duration::from_secs(5)).unwrap();
        assert_eq!(reply, Reply::Raw(vec![1, 2, 3, 4]));
        // The reply was available immediately; the budget must not be drained.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_at_least_rule_rejects_short_reply() {
        fn min_four(_args: &Args) -> ReplyLen {
            ReplyLen::AtLeast(4)
        }
        let cmd = Command {
            reply_len: min_four,
            ..GETCFG_LIKE
        };
        let mut port = MockPort::with_reply(&[1, 2]);
        let err = execute_with_timeout(&mut port, &cmd, &Args::None, FAST).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    /// Template descriptor for framing-rule tests.
    const GETCFG_LIKE: Command = Command {
        name: "TESTCMD",
        description: "test",
        firmware: "test",
        validate: |_| Ok(()),
        encode: |cmd, _| crate::protocol::frame::request(cmd.name),
        reply_len: |_| ReplyLen::None,
        decode: |raw| Ok(Reply::Raw(raw.to_vec())),
        timeout: None,
    };
}
