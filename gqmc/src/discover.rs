//! Serial port discovery for GQ counters.
//!
//! GQ GMC units expose their serial link through a handful of USB-to-UART
//! bridges (older units ship a PL2303, newer ones a CH340 or CP210x), so a
//! port can usually be picked automatically by USB VID/PID instead of being
//! spelled out by the operator.

use log::{debug, info, trace};

use crate::error::{Error, Result};

/// Known USB bridge kinds found on GQ counters and their cables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsbBridge {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Prolific PL2303 USB-to-Serial converter.
    Pl2303,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232 family USB-to-Serial converter.
    Ftdi,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs for the bridges above.
const KNOWN_BRIDGES: &[(u16, &[u16], UsbBridge)] = &[
    (0x1A86, &[0x7523, 0x7522, 0x5523], UsbBridge::Ch340),
    (0x067B, &[0x2303, 0x23A3, 0x23C3], UsbBridge::Pl2303),
    (0x10C4, &[0xEA60, 0xEA70], UsbBridge::Cp210x),
    (0x0403, &[0x6001, 0x6010, 0x6014, 0x6015], UsbBridge::Ftdi),
];

impl UsbBridge {
    /// Classify a VID/PID combination.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, kind) in KNOWN_BRIDGES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *kind;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the bridge.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Pl2303 => "PL2303",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected bridge type.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Detected serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// USB bridge type if classified.
    pub bridge: UsbBridge,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
}

impl DetectedPort {
    /// Check if this port is plausibly a GQ counter's serial link.
    pub fn is_likely_counter(&self) -> bool {
        self.bridge.is_known()
    }
}

/// Detect all available serial ports with USB bridge information.
pub fn detect_ports() -> Vec<DetectedPort> {
    let mut result = Vec::new();

    match serialport::available_ports() {
        Ok(ports) => {
            for port_info in ports {
                let mut detected = DetectedPort {
                    name: port_info.port_name.clone(),
                    bridge: UsbBridge::Unknown,
                    vid: None,
                    pid: None,
                    manufacturer: None,
                    product: None,
                };

                if let serialport::SerialPortType::UsbPort(usb_info) = port_info.port_type {
                    detected.vid = Some(usb_info.vid);
                    detected.pid = Some(usb_info.pid);
                    detected.manufacturer = usb_info.manufacturer;
                    detected.product = usb_info.product;
                    detected.bridge = UsbBridge::from_vid_pid(usb_info.vid, usb_info.pid);

                    trace!(
                        "Found USB port: {} (VID: {:04X}, PID: {:04X}, Bridge: {:?})",
                        port_info.port_name, usb_info.vid, usb_info.pid, detected.bridge
                    );
                }

                result.push(detected);
            }
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
        },
    }

    result
}

/// Auto-detect a single port candidate.
///
/// Returns the first port wired through a known USB-UART bridge, falling
/// back to any available port.
pub fn auto_detect_port() -> Result<DetectedPort> {
    let ports = detect_ports();

    if let Some(port) = ports.iter().find(|p| p.bridge.is_known()) {
        info!(
            "Auto-detected {} USB-UART bridge: {}",
            port.bridge.name(),
            port.name
        );
        return Ok(port.clone());
    }

    if let Some(port) = ports.into_iter().next() {
        info!("Using first available port: {}", port.name);
        return Ok(port);
    }

    Err(Error::DeviceNotFound)
}

/// Find a port by name pattern.
pub fn find_port_by_pattern(pattern: &str) -> Result<DetectedPort> {
    detect_ports()
        .into_iter()
        .find(|p| p.name.contains(pattern))
        .ok_or(Error::DeviceNotFound)
}
