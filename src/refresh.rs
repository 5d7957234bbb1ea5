//! The single operation the outside world calls: produce and transmit one
//! display frame.
//!
//! The scheduler, tray, or CLI hands in validated snapshots; this module
//! runs the pipeline end to end and reports timing and packet counts back.
//! One cycle is strictly sequential and synchronous: compose, binarize,
//! packetize, then the only I/O (discover, handshake, transmit). The core
//! provides no mutual exclusion of its own; the caller must not run two
//! cycles against the same physical device at once.

use crate::atlas::GlyphAtlas;
use crate::binarizer::binarize;
use crate::canvas::Canvas;
use crate::compositor::{Compositor, Layout, RenderError};
use crate::config::Config;
use crate::device::{DeviceChannel, DeviceError, DeviceIdentity};
use crate::packetizer::{packetize, Frame, FrameProtocol};
use crate::{SystemSnapshot, WeatherSnapshot};
use hidapi::HidApi;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Discriminated cycle failure. `Render` means the frame itself could not
/// be produced; `Device` means the frame was fine but the display was
/// unavailable or the transport failed.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("render: {0}")]
    Render(#[from] RenderError),

    #[error("device: {0}")]
    Device(#[from] DeviceError),
}

impl RefreshError {
    /// True when the failure is merely "display not plugged in right
    /// now"; the caller skips this refresh and retries on the next
    /// scheduled trigger.
    pub fn is_device_absent(&self) -> bool {
        matches!(self, RefreshError::Device(e) if e.is_device_absent())
    }
}

/// What one successful cycle did, reported back to the caller.
#[derive(Debug)]
pub struct RefreshReport {
    pub packets_sent: usize,
    pub render_time: Duration,
    pub transmit_time: Duration,
    pub identity: Option<DeviceIdentity>,
}

/// The pure half of the pipeline: snapshots → composited canvas + framed
/// packets. Used by the dry-run mode and by tests; touches no hardware.
pub fn render_frame(
    weather: &WeatherSnapshot,
    system: &SystemSnapshot,
    atlas: &GlyphAtlas,
    config: &Config,
) -> Result<(Canvas, Frame), RenderError> {
    let compositor = Compositor::new(
        atlas,
        Layout::default(),
        config.render.no_precip_sentinel.clone(),
    );
    let canvas = compositor.render(weather, system)?;
    let packed = binarize(&canvas, config.render.threshold);
    let frame = packetize(&packed, &FrameProtocol::default());
    Ok((canvas, frame))
}

/// Produce and transmit one display frame.
///
/// Every cycle repeats full device discovery; nothing is cached between
/// calls. When `diagnostic_png` is set the composited canvas is also
/// written to disk; failures there are logged and do not affect the
/// transmit path.
pub fn refresh_once(
    weather: &WeatherSnapshot,
    system: &SystemSnapshot,
    atlas: &GlyphAtlas,
    config: &Config,
    diagnostic_png: Option<&Path>,
) -> Result<RefreshReport, RefreshError> {
    let render_start = Instant::now();
    let (canvas, frame) = render_frame(weather, system, atlas, config)?;
    let render_time = render_start.elapsed();

    if let Some(path) = diagnostic_png {
        if let Err(e) = canvas.save_png(path) {
            warn!("diagnostic PNG not written: {e}");
        }
    }

    let api = HidApi::new().map_err(DeviceError::from)?;
    let mut channel = DeviceChannel::discover(&api, &config.device)?;
    let identity = channel.handshake()?;

    let transmit_start = Instant::now();
    let packets_sent = channel.transmit(&frame)?;
    let transmit_time = transmit_start.elapsed();

    info!(
        packets = packets_sent,
        render_ms = render_time.as_millis() as u64,
        transmit_ms = transmit_time.as_millis() as u64,
        "frame pushed"
    );

    Ok(RefreshReport {
        packets_sent,
        render_time,
        transmit_time,
        identity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::Sprite;
    use crate::packetizer::PacketRole;

    fn fixtures() -> (WeatherSnapshot, SystemSnapshot, GlyphAtlas, Config) {
        let weather = WeatherSnapshot {
            date: "2024-01-15".parse().unwrap(),
            temp_min: -5,
            temp_max: 10,
            temp_now: 3,
            icon_day: "100".into(),
            icon_night: "150".into(),
            text_day: "Sunny".into(),
            text_night: "Clear".into(),
            city: "Oslo".into(),
            latitude: 59.91,
            longitude: 10.75,
            minutely_summary: "No precipitation within two hours".into(),
        };
        let system = SystemSnapshot {
            cpu_percent: 55.0,
            core_percents: vec![10.0, 20.0, 85.0, 40.0],
            mem_total_gib: 16.0,
            mem_percent: 60,
        };
        let mut atlas = GlyphAtlas::synthetic();
        atlas.insert("100", Sprite::solid(52, 52, [0, 0, 0]));
        atlas.insert("150", Sprite::solid(52, 52, [0, 0, 0]));
        atlas.insert("Sunny", Sprite::solid(56, 20, [0, 0, 0]));
        atlas.insert("Clear", Sprite::solid(56, 20, [0, 0, 0]));
        (weather, system, atlas, Config::default())
    }

    #[test]
    fn render_frame_yields_a_complete_packet_sequence() {
        let (weather, system, atlas, config) = fixtures();
        let (canvas, frame) = render_frame(&weather, &system, &atlas, &config).unwrap();

        assert_eq!(canvas.width(), 128);
        assert_eq!(frame.len(), 77);
        assert_eq!(frame.packets()[0].role(), PacketRole::Head);
        assert_eq!(frame.packets()[76].role(), PacketRole::Trailer);
    }

    #[test]
    fn device_absence_is_distinguishable_from_render_failure() {
        let absent: RefreshError = DeviceError::NotFound {
            vendor_id: 0x1d50,
            product_id: 0x615e,
        }
        .into();
        assert!(absent.is_device_absent());

        let render: RefreshError = RenderError::UnsupportedLength {
            what: "min temperature",
            len: 4,
        }
        .into();
        assert!(!render.is_device_absent());
    }
}
