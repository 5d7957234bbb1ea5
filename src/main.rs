//! # Weather Ink Application Entry Point
//!
//! This binary runs one refresh cycle: load the snapshot document the
//! acquisition step produced, compose and binarize the frame, and push it
//! to the display. Scheduling, tray integration, and telemetry acquisition
//! live outside this program; a missing device is a skipped refresh, not a
//! failure.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use weather_ink_lib::atlas::GlyphAtlas;
use weather_ink_lib::config::Config;
use weather_ink_lib::refresh::{refresh_once, render_frame};
use weather_ink_lib::SnapshotDocument;

#[derive(Debug, Parser)]
#[command(name = "weather-ink", about = "Push a weather/telemetry frame to the e-ink display")]
struct Args {
    /// Snapshot JSON produced by the acquisition step
    #[arg(long, default_value = "snapshot.json")]
    input: PathBuf,

    /// Configuration file (defaults to weather-ink.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the composited canvas as a PNG for inspection
    #[arg(long)]
    output: Option<PathBuf>,

    /// Build the frame but do not touch the device
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let atlas = GlyphAtlas::load_from_dir(&config.render.asset_dir).with_context(|| {
        format!(
            "loading sprite assets from {}",
            config.render.asset_dir.display()
        )
    })?;

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("reading snapshot document {}", args.input.display()))?;
    let doc: SnapshotDocument =
        serde_json::from_str(&raw).context("parsing snapshot document")?;
    doc.weather
        .validate()
        .context("weather snapshot failed validation")?;
    doc.system
        .validate()
        .context("system snapshot failed validation")?;

    let (lat, lon) = doc.weather.coords();
    info!(city = %doc.weather.city, lat, lon, "snapshots loaded");

    if args.dry_run {
        let (canvas, frame) = render_frame(&doc.weather, &doc.system, &atlas, &config)?;
        if let Some(path) = &args.output {
            canvas
                .save_png(path)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        info!(
            packets = frame.len(),
            bytes = frame.wire_len(),
            "dry run: frame built, device untouched"
        );
        return Ok(());
    }

    match refresh_once(
        &doc.weather,
        &doc.system,
        &atlas,
        &config,
        args.output.as_deref(),
    ) {
        Ok(report) => {
            info!(
                packets = report.packets_sent,
                render_ms = report.render_time.as_millis() as u64,
                transmit_ms = report.transmit_time.as_millis() as u64,
                "display refreshed"
            );
            Ok(())
        }
        // An unplugged display is routine; the next scheduled run retries
        Err(e) if e.is_device_absent() => {
            warn!("{e}; skipping this refresh");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
