//! # Weather Ink Core Library
//!
//! This library renders weather and host-machine telemetry onto a small
//! HID-attached e-ink display. The pipeline is a chain of pure
//! transformations with exactly one I/O stage at the end:
//!
//! ```text
//! snapshots → compositor (glyph atlas) → binarizer → packetizer → device
//! ```
//!
//! ## Design Philosophy
//!
//! ### One frame, one cycle
//! The surrounding application (tray icon, scheduler, settings dialog) is
//! an external collaborator. It hands the core two validated snapshots and
//! asks for a single operation: produce and transmit one display frame
//! ([`refresh::refresh_once`]). The core reports success/failure and timing
//! back; it keeps no state between cycles and re-discovers the device every
//! time.
//!
//! ### Explicit configuration
//! Pixel-offset tables, the binarization threshold, and the packet protocol
//! geometry are immutable values constructed once at startup and passed
//! explicitly into the compositor and packetizer. Nothing in the render
//! path reads global state, which is what makes the glyph atlas swappable
//! for synthetic sprites in tests.
//!
//! ### Error discipline
//! A missing sprite aborts the render ([`compositor::RenderError`]); an
//! absent or misbehaving device aborts the cycle but not the process
//! ([`device::DeviceError`]). The caller receives a discriminated result
//! and decides whether to retry on the next scheduled trigger.
//!
//! ## Core Types
//!
//! - [`WeatherSnapshot`]: one day of forecast data plus current conditions
//! - [`SystemSnapshot`]: aggregate and per-core CPU plus memory figures
//! - [`SnapshotDocument`]: the JSON handoff format from the acquisition step

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Module declarations
pub mod atlas;
pub mod binarizer;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod device;
pub mod packetizer;
pub mod refresh;

/// Errors raised while validating acquired telemetry.
///
/// Acquisition happens outside the core; these errors exist so the caller
/// can reject a malformed snapshot *before* a render cycle starts rather
/// than discovering the problem halfway through layout.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// A temperature field did not parse as a signed integer
    #[error("temperature {0:?} is not a signed integer")]
    BadTemperature(String),

    /// A percentage field fell outside 0-100
    #[error("{field} is {value}, outside 0-100")]
    PercentOutOfRange { field: &'static str, value: f64 },

    /// A required text field was empty
    #[error("required field {0} is empty")]
    EmptyField(&'static str),
}

/// One day of weather data plus current conditions, as acquired upstream.
///
/// Condition codes (`icon_day`/`icon_night`) and condition text
/// (`text_day`/`text_night`) are used verbatim as sprite keys by the
/// compositor. Latitude/longitude are carried for diagnostics only and are
/// reported rounded to two decimals.
///
/// # Example
/// ```
/// use weather_ink_lib::WeatherSnapshot;
///
/// let snap = WeatherSnapshot {
///     date: "2024-01-15".parse().unwrap(),
///     temp_min: -5,
///     temp_max: 10,
///     temp_now: 3,
///     icon_day: "100".into(),
///     icon_night: "150".into(),
///     text_day: "Sunny".into(),
///     text_night: "Clear".into(),
///     city: "Oslo".into(),
///     latitude: 59.91,
///     longitude: 10.75,
///     minutely_summary: "No precipitation within two hours".into(),
/// };
/// assert!(snap.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Forecast date; the weekday sprite key is derived from it
    pub date: NaiveDate,
    /// Daily minimum temperature, degrees
    pub temp_min: i16,
    /// Daily maximum temperature, degrees
    pub temp_max: i16,
    /// Current temperature, degrees
    pub temp_now: i16,
    /// Daytime condition code (icon sprite key)
    pub icon_day: String,
    /// Nighttime condition code (icon sprite key)
    pub icon_night: String,
    /// Daytime condition text (text sprite key)
    pub text_day: String,
    /// Nighttime condition text (text sprite key)
    pub text_night: String,
    /// City display name, rendered glyph by glyph
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Minutely precipitation summary; the configured sentinel text means
    /// "no precipitation expected"
    pub minutely_summary: String,
}

impl WeatherSnapshot {
    /// Check the input contract the compositor relies on.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for (name, value) in [
            ("icon_day", &self.icon_day),
            ("icon_night", &self.icon_night),
            ("text_day", &self.text_day),
            ("text_night", &self.text_night),
            ("city", &self.city),
            ("minutely_summary", &self.minutely_summary),
        ] {
            if value.is_empty() {
                return Err(SnapshotError::EmptyField(name));
            }
        }
        Ok(())
    }

    /// Coordinates rounded to two decimals for diagnostic logging.
    pub fn coords(&self) -> (f64, f64) {
        (
            (self.latitude * 100.0).round() / 100.0,
            (self.longitude * 100.0).round() / 100.0,
        )
    }

    /// Localized weekday name for the forecast date, e.g. `"Monday"`.
    /// Weekday sprites and the canned no-precipitation sprite are keyed
    /// off this string.
    pub fn weekday(&self) -> String {
        self.date.format("%A").to_string()
    }
}

/// Host-machine telemetry for one refresh cycle.
///
/// The per-core list length selects the core-panel template (2/4/6/8
/// cores); anything else falls back to the 8-core template and only the
/// first eight entries are drawn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Aggregate CPU utilization, 0-100
    pub cpu_percent: f32,
    /// Per-logical-core utilization, 0-100 each
    pub core_percents: Vec<f32>,
    /// Total physical memory in GiB, already rounded by acquisition
    pub mem_total_gib: f64,
    /// Memory utilization, integer 0-100
    pub mem_percent: u8,
}

impl SystemSnapshot {
    /// Check the input contract the compositor relies on.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !(0.0..=100.0).contains(&self.cpu_percent) {
            return Err(SnapshotError::PercentOutOfRange {
                field: "cpu_percent",
                value: self.cpu_percent as f64,
            });
        }
        for &core in &self.core_percents {
            if !(0.0..=100.0).contains(&core) {
                return Err(SnapshotError::PercentOutOfRange {
                    field: "core_percents",
                    value: core as f64,
                });
            }
        }
        if self.mem_percent > 100 {
            return Err(SnapshotError::PercentOutOfRange {
                field: "mem_percent",
                value: self.mem_percent as f64,
            });
        }
        Ok(())
    }

    /// Core-panel template for this snapshot: 2, 4, 6 or 8.
    /// Unrecognized core counts use the 8-core frame.
    pub fn panel_template(&self) -> usize {
        match self.core_percents.len() {
            n @ (2 | 4 | 6 | 8) => n,
            _ => 8,
        }
    }
}

/// The JSON document the acquisition collaborator hands the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub weather: WeatherSnapshot,
    pub system: SystemSnapshot,
}

/// Parse a temperature string with an optional leading sign.
///
/// Acquisition sources report temperatures as text, sometimes with a unit
/// suffix attached; everything except digits and a leading `-` is dropped
/// before parsing, and an empty or sign-only remainder is an error.
///
/// # Example
/// ```
/// use weather_ink_lib::parse_signed_temp;
///
/// assert_eq!(parse_signed_temp("-5").unwrap(), -5);
/// assert_eq!(parse_signed_temp("10°C").unwrap(), 10);
/// assert!(parse_signed_temp("n/a").is_err());
/// ```
pub fn parse_signed_temp(raw: &str) -> Result<i16, SnapshotError> {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    filtered
        .parse()
        .map_err(|_| SnapshotError::BadTemperature(raw.to_string()))
}
