//! HID device channel.
//!
//! The display is one logical interface on a multi-interface HID device.
//! Each refresh cycle walks the same short state machine:
//!
//! ```text
//! Idle → Discovering → Handshaking → Transmitting → Idle | Failed
//! ```
//!
//! No state survives between cycles: discovery runs fresh every time, and
//! dropping the [`DeviceChannel`] closes the HID handle on every exit
//! path, success or failure. Transmission is fire-and-forget: packets are
//! written in order with no acknowledgment wait, and the first transport
//! error aborts the rest of the frame. Only the identity query reads a
//! response, and that is diagnostic only.
//!
//! Writes go through the [`ReportWriter`] seam so the framing and ordering
//! logic tests against a mock transport; only discovery itself touches
//! `hidapi` directly.

use crate::config::DeviceConfig;
use crate::packetizer::Frame;
use hidapi::{HidApi, HidDevice, HidError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Identity query report: fixed prefix, zero-filled to the report length.
const IDENTITY_QUERY_PREFIX: [u8; 6] = [0x01, 0x05, 0x04, 0x08, 0x01, 0x12];
const IDENTITY_QUERY_LEN: usize = 66;
/// Upper bound on the identity response read.
const IDENTITY_RESPONSE_LEN: usize = 1000;

/// Device-channel failures. None of these are fatal to the process: the
/// caller skips the refresh and retries on the next scheduled trigger.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No HID device matches the configured vendor/product id
    #[error("display device {vendor_id:04x}:{product_id:04x} is not connected")]
    NotFound { vendor_id: u16, product_id: u16 },

    /// The device is present but no interface exposes the display channel
    #[error("device found but no interface exposes usage page {usage_page}")]
    InterfaceNotFound { usage_page: u16 },

    /// The underlying HID transport failed
    #[error("HID transport: {0}")]
    Hid(#[from] HidError),

    /// A packet write failed mid-frame; the display may show a torn frame
    /// until the next successful full cycle
    #[error("transmit aborted at packet {index}")]
    Transmit {
        index: usize,
        #[source]
        source: Box<DeviceError>,
    },
}

impl DeviceError {
    /// Both discovery failures mean "device unavailable, skip this
    /// refresh" rather than anything being wrong with the frame.
    pub fn is_device_absent(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound { .. } | DeviceError::InterfaceNotFound { .. }
        )
    }
}

/// Version strings read back from the device, for diagnostic logging only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub runtime: String,
    pub middleware: String,
    pub firmware: String,
}

/// The identifying fields of one enumerated HID interface.
#[derive(Clone, Copy, Debug)]
pub struct InterfaceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
}

/// Pick the display interface among enumerated candidates: the
/// vendor/product match whose usage page equals the configured value.
pub fn select_interface(
    candidates: &[InterfaceInfo],
    config: &DeviceConfig,
) -> Result<usize, DeviceError> {
    let mut device_present = false;
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.vendor_id == config.vendor_id && candidate.product_id == config.product_id {
            device_present = true;
            if candidate.usage_page == config.usage_page {
                return Ok(index);
            }
        }
    }
    if device_present {
        Err(DeviceError::InterfaceNotFound {
            usage_page: config.usage_page,
        })
    } else {
        Err(DeviceError::NotFound {
            vendor_id: config.vendor_id,
            product_id: config.product_id,
        })
    }
}

/// Anything that accepts fixed-size output reports in order.
pub trait ReportWriter {
    fn write_report(&mut self, report: &[u8]) -> Result<(), DeviceError>;
}

impl ReportWriter for HidDevice {
    fn write_report(&mut self, report: &[u8]) -> Result<(), DeviceError> {
        HidDevice::write(self, report)?;
        Ok(())
    }
}

/// Write every packet of the frame in order, no acknowledgment wait, no
/// retry. The first failed write aborts the remainder and reports the
/// failed packet's index.
pub fn transmit_frame<W: ReportWriter>(writer: &mut W, frame: &Frame) -> Result<usize, DeviceError> {
    for (index, packet) in frame.packets().iter().enumerate() {
        writer
            .write_report(packet.as_bytes())
            .map_err(|source| DeviceError::Transmit {
                index,
                source: Box::new(source),
            })?;
    }
    Ok(frame.len())
}

/// An open connection to the display interface. Owns the HID handle;
/// dropping the channel closes it.
pub struct DeviceChannel {
    device: HidDevice,
}

impl DeviceChannel {
    /// Enumerate, match, and open the display interface.
    pub fn discover(api: &HidApi, config: &DeviceConfig) -> Result<Self, DeviceError> {
        let infos: Vec<_> = api.device_list().collect();
        let candidates: Vec<InterfaceInfo> = infos
            .iter()
            .map(|d| InterfaceInfo {
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                usage_page: d.usage_page(),
            })
            .collect();

        let index = select_interface(&candidates, config)?;
        let device = infos[index].open_device(api)?;
        debug!(
            "display interface {:04x}:{:04x} opened",
            config.vendor_id, config.product_id
        );
        Ok(Self { device })
    }

    /// Query the device's identity strings and log them. A response that
    /// cannot be parsed is logged and ignored; only transport failures
    /// surface as errors.
    pub fn handshake(&mut self) -> Result<Option<DeviceIdentity>, DeviceError> {
        let mut query = [0u8; IDENTITY_QUERY_LEN];
        query[..IDENTITY_QUERY_PREFIX.len()].copy_from_slice(&IDENTITY_QUERY_PREFIX);
        self.device.write(&query)?;

        let mut response = [0u8; IDENTITY_RESPONSE_LEN];
        let read = self.device.read(&mut response)?;
        let text = decode_dropping_invalid(&response[..read]);

        match parse_identity(&text) {
            Some(identity) => {
                info!(
                    runtime = %identity.runtime,
                    middleware = %identity.middleware,
                    firmware = %identity.firmware,
                    "device identity"
                );
                Ok(Some(identity))
            }
            None => {
                warn!(bytes = read, "identity response too short to parse");
                Ok(None)
            }
        }
    }

    /// See [`transmit_frame`].
    pub fn transmit(&mut self, frame: &Frame) -> Result<usize, DeviceError> {
        transmit_frame(&mut self.device, frame)
    }
}

/// Decode as UTF-8, dropping undecodable bytes entirely.
fn decode_dropping_invalid(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Slice the decoded identity text at the fixed character offsets the
/// response format uses: runtime [9..16], middleware [18..25], firmware
/// [27..34].
pub fn parse_identity(text: &str) -> Option<DeviceIdentity> {
    let chars: Vec<char> = text.chars().collect();
    let slice = |start: usize, end: usize| -> Option<String> {
        chars
            .get(start..end)
            .map(|window| window.iter().collect::<String>().trim().to_string())
    };
    Some(DeviceIdentity {
        runtime: slice(9, 16)?,
        middleware: slice(18, 25)?,
        firmware: slice(27, 34)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packetizer::{packetize, FrameProtocol};

    /// Records written reports; optionally fails at a fixed write index.
    struct MockTransport {
        written: Vec<Vec<u8>>,
        fail_at: Option<usize>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                written: Vec::new(),
                fail_at: None,
            }
        }

        fn failing_at(index: usize) -> Self {
            Self {
                written: Vec::new(),
                fail_at: Some(index),
            }
        }
    }

    impl ReportWriter for MockTransport {
        fn write_report(&mut self, report: &[u8]) -> Result<(), DeviceError> {
            if self.fail_at == Some(self.written.len()) {
                return Err(DeviceError::Hid(HidError::HidApiError {
                    message: "unplugged".to_string(),
                }));
            }
            self.written.push(report.to_vec());
            Ok(())
        }
    }

    fn config() -> DeviceConfig {
        DeviceConfig {
            vendor_id: 0x1d50,
            product_id: 0x615e,
            usage_page: 65300,
        }
    }

    #[test]
    fn selection_with_no_vid_pid_match_is_not_found() {
        let candidates = [InterfaceInfo {
            vendor_id: 0x046d,
            product_id: 0xc52b,
            usage_page: 1,
        }];
        let err = select_interface(&candidates, &config()).unwrap_err();
        assert!(matches!(err, DeviceError::NotFound { .. }));
        assert!(err.is_device_absent());
    }

    #[test]
    fn selection_without_display_interface_is_interface_not_found() {
        let candidates = [
            InterfaceInfo {
                vendor_id: 0x1d50,
                product_id: 0x615e,
                usage_page: 1,
            },
            InterfaceInfo {
                vendor_id: 0x1d50,
                product_id: 0x615e,
                usage_page: 12,
            },
        ];
        let err = select_interface(&candidates, &config()).unwrap_err();
        assert!(matches!(err, DeviceError::InterfaceNotFound { usage_page: 65300 }));
        assert!(err.is_device_absent());
    }

    #[test]
    fn selection_picks_the_display_interface_among_siblings() {
        let candidates = [
            InterfaceInfo {
                vendor_id: 0x1d50,
                product_id: 0x615e,
                usage_page: 1,
            },
            InterfaceInfo {
                vendor_id: 0x1d50,
                product_id: 0x615e,
                usage_page: 65300,
            },
        ];
        assert_eq!(select_interface(&candidates, &config()).unwrap(), 1);
    }

    #[test]
    fn transmit_writes_every_packet_in_order() {
        let frame = packetize(&[0xAB; 400], &FrameProtocol::default());
        let mut transport = MockTransport::new();

        let sent = transmit_frame(&mut transport, &frame).unwrap();
        assert_eq!(sent, frame.len());
        assert_eq!(transport.written.len(), frame.len());
        for (written, packet) in transport.written.iter().zip(frame.packets()) {
            assert_eq!(written, packet.as_bytes());
        }
    }

    #[test]
    fn transmit_aborts_at_the_failing_packet() {
        let frame = packetize(&[0x11; 400], &FrameProtocol::default());
        assert!(frame.len() > 3);
        let mut transport = MockTransport::failing_at(2);

        let err = transmit_frame(&mut transport, &frame).unwrap_err();
        match err {
            DeviceError::Transmit { index, .. } => assert_eq!(index, 2),
            other => panic!("expected Transmit, got {other:?}"),
        }
        // Nothing after the failed packet went on the wire
        assert_eq!(transport.written.len(), 2);
    }

    #[test]
    fn identity_parses_at_fixed_offsets() {
        let text = format!(
            "{:9}{}{:2}{}{:2}{}",
            "", "3.5.0-a", "", "2.1.0-b", "", "1.0.7-c"
        );
        let identity = parse_identity(&text).unwrap();
        assert_eq!(identity.runtime, "3.5.0-a");
        assert_eq!(identity.middleware, "2.1.0-b");
        assert_eq!(identity.firmware, "1.0.7-c");
    }

    #[test]
    fn short_identity_response_is_none_not_panic() {
        assert!(parse_identity("").is_none());
        assert!(parse_identity("only twenty chars..").is_none());
    }

    #[test]
    fn undecodable_bytes_are_dropped_before_slicing() {
        let mut bytes = vec![0xFF, 0xFE]; // invalid UTF-8, dropped
        bytes.extend_from_slice("payload".as_bytes());
        assert_eq!(decode_dropping_invalid(&bytes), "payload");
    }
}
