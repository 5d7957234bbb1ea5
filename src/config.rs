//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! weather-ink.toml file. It provides a centralized way to configure the
//! target device identifiers, the binarization threshold, and the sprite
//! asset location.
//!
//! The loaded [`Config`] is immutable for the lifetime of the process and
//! is passed explicitly into the pipeline stages that need it; no stage
//! reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application configuration loaded from weather-ink.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Target display device identification
    pub device: DeviceConfig,
    /// Rendering configuration
    pub render: RenderConfig,
}

/// HID identification of the display device.
///
/// The display is one logical interface on a multi-interface device; the
/// usage page picks the vendor-defined interface among the VID/PID matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Vendor-defined usage page exposing the display channel
    pub usage_page: u16,
}

/// Rendering and binarization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Directory containing the sprite assets (digits, icons, weekday
    /// labels, core-panel frames)
    pub asset_dir: PathBuf,
    /// Grayscale cutoff for binarization; below is black, at or above is
    /// white
    pub threshold: u8,
    /// Summary text meaning "no precipitation expected"; compared verbatim
    /// against the acquired minutely summary
    pub no_precip_sentinel: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: DeviceConfig {
                vendor_id: 0x1d50,
                product_id: 0x615e,
                usage_page: 65300,
            },
            render: RenderConfig {
                asset_dir: PathBuf::from("assets"),
                threshold: 128,
                no_precip_sentinel: "No precipitation within two hours".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from weather-ink.toml.
    /// Falls back to default configuration if the file doesn't exist or is
    /// invalid.
    pub fn load() -> Self {
        Self::load_from_path("weather-ink.toml")
    }

    /// Load configuration from the specified path.
    /// Falls back to default configuration if the file doesn't exist or is
    /// invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        "loaded configuration for device {:04x}:{:04x}",
                        config.device.vendor_id, config.device.product_id
                    );
                    config
                }
                Err(e) => {
                    warn!("invalid config file format: {e}; using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save the current configuration to weather-ink.toml.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write("weather-ink.toml", contents)?;
        info!("configuration saved to weather-ink.toml");
        Ok(())
    }
}
