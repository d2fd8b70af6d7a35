//! Baud-rate auto-detection.
//!
//! The device gives no out-of-band signal of its configured link speed, so
//! discovery probes each candidate rate with the version query — a
//! read-only, idempotent command that is safe to repeat and cheap to time
//! out on. Discovery is a bounded state machine, not an open-ended loop:
//! each candidate is tried exactly once, so a discovery call makes at most
//! `candidates.len()` probes before reporting [`Error::BaudNotFound`].
//! Only a silent or garbled probe moves on to the next candidate; a
//! transport fault fails the same way at every rate and aborts discovery
//! with the underlying error.
//!
//! Discovery reconfigures the port's baud rate as it goes. It must not be
//! interleaved with other command executions on the same port, and if
//! abandoned mid-probe the port is left at whatever candidate was last
//! tried — treat the rate as indeterminate until re-probed.

use std::time::Duration;

use log::{debug, info};

use crate::engine;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::commands::{Args, GETVER, Reply};

/// Candidate baud rates, highest first.
///
/// Every rate the device family supports; ordering only affects discovery
/// latency, and factory-fresh units ship at the high end.
pub const BAUD_CANDIDATES: [u32; 10] = [
    115200, 57600, 38400, 28800, 19200, 14400, 9600, 4800, 2400, 1200,
];

/// Per-candidate probe budget.
///
/// Deliberately shorter than the engine default: most candidates are wrong
/// and their failure should be cheap.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Discovery progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Probing the candidate at this index.
    Probing(usize),
    /// A recognizable version reply was observed at this rate. Terminal.
    Found(u32),
    /// Every candidate was tried without success. Terminal.
    Exhausted,
}

/// Discover the device baud rate using the default candidate list.
///
/// On success the port is left configured at the discovered rate with its
/// buffers cleared, ready for normal command execution.
pub fn discover<P: Port>(port: &mut P) -> Result<u32> {
    discover_with(port, &BAUD_CANDIDATES)
}

/// Discover the device baud rate over a caller-supplied candidate list,
/// probed in order.
pub fn discover_with<P: Port>(port: &mut P, candidates: &[u32]) -> Result<u32> {
    info!(
        "Probing {} for the device baud rate ({} candidates)",
        port.name(),
        candidates.len()
    );

    let mut state = Discovery::Probing(0);
    loop {
        state = match state {
            Discovery::Probing(index) => match candidates.get(index) {
                None => Discovery::Exhausted,
                Some(&baud) => match probe(port, baud) {
                    Ok(version) => {
                        info!("Device answered at {baud} baud: {version}");
                        Discovery::Found(baud)
                    },
                    Err(e @ (Error::Timeout(_) | Error::Protocol { .. })) => {
                        // Expected misses at a wrong rate, never surfaced to
                        // the caller.
                        debug!("No device at {baud} baud: {e}");
                        Discovery::Probing(index + 1)
                    },
                    // A dead handle fails identically at every rate.
                    Err(e) => return Err(e),
                },
            },
            Discovery::Found(baud) => {
                port.clear_buffers()?;
                return Ok(baud);
            },
            Discovery::Exhausted => return Err(Error::BaudNotFound),
        };
    }
}

/// One version-query probe at the given rate.
fn probe<P: Port>(port: &mut P, baud: u32) -> Result<String> {
    port.set_baud_rate(baud)?;
    port.clear_buffers()?;

    match engine::execute_with_timeout(port, &GETVER, &Args::None, PROBE_TIMEOUT)? {
        Reply::Text(version) => Ok(version),
        other => Err(Error::Protocol {
            reason: format!("unexpected version reply shape: {other:?}"),
            raw: Vec::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;

    /// A port that answers the version query only at one fixed rate and
    /// replies with line noise at every other rate.
    struct FixedBaudPort {
        device_baud: u32,
        current_baud: u32,
        probes: usize,
        pending: Vec<u8>,
        timeout: Duration,
    }

    impl FixedBaudPort {
        fn at(device_baud: u32) -> Self {
            Self {
                device_baud,
                current_baud: 0,
                probes: 0,
                pending: Vec::new(),
                timeout: Duration::from_millis(50),
            }
        }
    }

    impl Read for FixedBaudPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"));
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    impl Write for FixedBaudPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.starts_with(b"<GETVER") {
                self.probes += 1;
                self.pending = if self.current_baud == self.device_baud {
                    b"GMC-320Re 4.22".to_vec()
                } else {
                    // Framing garbage, the right length but not ASCII
                    vec![0xF8; 14]
                };
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for FixedBaudPort {
        fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn set_baud_rate(&mut self, baud_rate: u32) -> crate::Result<()> {
            self.current_baud = baud_rate;
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            self.current_baud
        }

        fn clear_buffers(&mut self) -> crate::Result<()> {
            self.pending.clear();
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn close(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    /// A port whose handle has died: every transfer fails outright.
    struct DeadPort {
        attempts: usize,
        timeout: Duration,
    }

    impl Read for DeadPort {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "port closed",
            ))
        }
    }

    impl Write for DeadPort {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "port closed",
            ))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for DeadPort {
        fn set_timeout(&mut self, timeout: Duration) -> crate::Result<()> {
            self.timeout = timeout;
            Ok(())
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn set_baud_rate(&mut self, _baud_rate: u32) -> crate::Result<()> {
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            0
        }

        fn clear_buffers(&mut self) -> crate::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "dead"
        }

        fn close(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_transport_fault_aborts_discovery_on_first_probe() {
        let mut port = DeadPort {
            attempts: 0,
            timeout: Duration::from_millis(50),
        };
        let err = discover_with(&mut port, &[1200, 9600, 57600]).unwrap_err();
        // The I/O error comes back as-is, not as BaudNotFound, and the
        // remaining candidates are never tried.
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(port.attempts, 1);
    }

    #[test]
    fn test_finds_device_after_exactly_k_probes() {
        let mut port = FixedBaudPort::at(57600);
        let baud = discover_with(&mut port, &[1200, 9600, 57600]).unwrap();
        assert_eq!(baud, 57600);
        assert_eq!(port.probes, 3); // two failures, then the hit
        assert_eq!(port.current_baud, 57600);
    }

    #[test]
    fn test_first_candidate_hit_probes_once() {
        let mut port = FixedBaudPort::at(115200);
        let baud = discover_with(&mut port, &[115200, 57600]).unwrap();
        assert_eq!(baud, 115200);
        assert_eq!(port.probes, 1);
    }

    #[test]
    fn test_unreachable_device_exhausts_after_n_probes() {
        let mut port = FixedBaudPort::at(230400); // not in the list
        let err = discover_with(&mut port, &[1200, 2400, 4800]).unwrap_err();
        assert!(matches!(err, Error::BaudNotFound));
        assert_eq!(port.probes, 3); // exactly one probe per candidate
    }

    #[test]
    fn test_empty_candidate_list_is_exhausted_immediately() {
        let mut port = FixedBaudPort::at(9600);
        let err = discover_with(&mut port, &[]).unwrap_err();
        assert!(matches!(err, Error::BaudNotFound));
        assert_eq!(port.probes, 0);
    }

    #[test]
    fn test_default_candidates_are_descending() {
        assert!(BAUD_CANDIDATES.windows(2).all(|w| w[0] > w[1]));
    }
}
