//! Sprite layout engine.
//!
//! The compositor turns one [`WeatherSnapshot`] and one [`SystemSnapshot`]
//! into a finished [`Canvas`]. Positioning is deterministic and driven by
//! string lengths and sprite widths; the pixel-offset tables live in an
//! immutable [`Layout`] value so nothing in here reads global state and
//! tests can substitute a synthetic atlas.
//!
//! The offset tables are literal lookup tables keyed by integer length
//! classes. They reproduce the display's visual layout exactly and are not
//! derivable from a general formula; treat the numbers as part of the
//! device's appearance contract.

use crate::atlas::{GlyphAtlas, MissingAssetError};
use crate::canvas::Canvas;
use crate::{SystemSnapshot, WeatherSnapshot};
use embedded_graphics::mono_font::ascii::{FONT_5X8, FONT_6X10};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use thiserror::Error;

/// Errors that abort a render. Never recovered within the cycle; the
/// caller logs and skips the frame.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A sprite key was not present in the atlas
    #[error(transparent)]
    MissingAsset(#[from] MissingAssetError),

    /// A value's string length has no entry in the offset tables.
    /// Out-of-table lengths are rejected rather than guessed.
    #[error("no layout bucket for {what} of length {len}")]
    UnsupportedLength { what: &'static str, len: usize },
}

/// Fixed pixel geometry of the 128×296 layout.
///
/// Constructed once at startup and passed into the compositor. The
/// `Default` values are the production layout; tests normally keep them
/// and substitute the atlas instead.
#[derive(Debug, Clone)]
pub struct Layout {
    pub date_origin: (i32, i32),
    pub weekday_origin: (i32, i32),
    pub cpu_icon_origin: (i32, i32),
    pub cpu_digits_origin: (i32, i32),
    pub mem_icon_origin: (i32, i32),
    pub mem_digits_origin: (i32, i32),
    pub core_frame_origin: (i32, i32),
    pub core_cells_origin: (i32, i32),
    pub icon_day_origin: (i32, i32),
    pub icon_night_origin: (i32, i32),
    pub text_day_origin: (i32, i32),
    pub text_night_origin: (i32, i32),
    pub wave_origins: [(i32, i32); 2],
    pub no_rain_origin: (i32, i32),
    pub city_column_x: i32,
    /// Row of the min/max temperature strips
    pub minmax_row: i32,
    /// Row of the current-temperature strip and its label
    pub now_row: i32,
    pub now_label_row: i32,
    /// Horizontal advance per temperature digit
    pub digit_pitch: i32,
    /// Each min/max strip is centered within one half of the canvas
    pub half_width: i32,
    /// Width reserved for the trailing unit sprite when centering
    pub unit_allowance: i32,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            date_origin: (4, 9),
            weekday_origin: (0, 32),
            cpu_icon_origin: (5, 55),
            cpu_digits_origin: (23, 55),
            mem_icon_origin: (5, 76),
            mem_digits_origin: (23, 76),
            core_frame_origin: (87, 54),
            core_cells_origin: (90, 57),
            icon_day_origin: (6, 96),
            icon_night_origin: (70, 96),
            text_day_origin: (0, 150),
            text_night_origin: (72, 150),
            wave_origins: [(58, 148), (58, 175)],
            no_rain_origin: (0, 227),
            city_column_x: 60,
            minmax_row: 180,
            now_row: 209,
            now_label_row: 205,
            digit_pitch: 12,
            half_width: 64,
            unit_allowance: 8,
        }
    }
}

impl Layout {
    /// Centering offset for a min/max temperature strip within its half
    /// of the canvas. Defined for string lengths 1-3 only.
    pub fn centered_temp_x(&self, len: usize) -> Option<i32> {
        if !(1..=3).contains(&len) {
            return None;
        }
        Some((self.half_width - (self.digit_pitch * len as i32 + self.unit_allowance)) / 2)
    }

    /// (label x, digits x) for the current-temperature strip.
    pub fn now_origins(&self, len: usize) -> Option<(i32, i32)> {
        match len {
            3 => Some((4, 80)),
            2 => Some((9, 87)),
            1 => Some((13, 95)),
            _ => None,
        }
    }

    /// Start column for the memory-percentage strip. Later strips must
    /// not collide with the total-memory strip to their left, so the
    /// start shifts with the value's width.
    pub fn mem_percent_x(&self, len: usize) -> i32 {
        match len {
            3 => 75,
            2 => 87,
            _ => 99,
        }
    }

    /// Horizontal pitch between core cells for a panel template.
    pub fn core_pitch(&self, template: usize) -> i32 {
        match template {
            2 => 16,
            4 => 8,
            6 => 5,
            _ => 4,
        }
    }

    /// (start row, vertical pitch) of the city-name column, keyed by name
    /// length so long names don't overflow the panel.
    pub fn city_column(&self, len: usize) -> (i32, i32) {
        match len {
            4 => (103, 10),
            3 => (105, 13),
            2 => (110, 15),
            _ => (120, 20),
        }
    }
}

/// Composites snapshots onto a canvas using a glyph atlas.
pub struct Compositor<'a> {
    atlas: &'a GlyphAtlas,
    layout: Layout,
    no_precip_sentinel: String,
}

impl<'a> Compositor<'a> {
    pub fn new(atlas: &'a GlyphAtlas, layout: Layout, no_precip_sentinel: impl Into<String>) -> Self {
        Self {
            atlas,
            layout,
            no_precip_sentinel: no_precip_sentinel.into(),
        }
    }

    /// Produce a fully composited canvas. The only failure modes are a
    /// missing sprite key or a value whose length has no layout bucket.
    pub fn render(
        &self,
        weather: &WeatherSnapshot,
        system: &SystemSnapshot,
    ) -> Result<Canvas, RenderError> {
        let mut canvas = Canvas::new();
        let weekday = weather.weekday();

        self.draw_date_strip(&mut canvas, weather)?;
        self.draw_weekday(&mut canvas, &weekday)?;
        self.draw_cpu_strip(&mut canvas, system)?;
        self.draw_memory_strips(&mut canvas, system)?;
        self.draw_core_panel(&mut canvas, system)?;
        self.draw_weather_panel(&mut canvas, weather)?;
        self.draw_city_name(&mut canvas, &weather.city);
        self.draw_temperature_strips(&mut canvas, weather)?;
        self.draw_precipitation(&mut canvas, weather, &weekday)?;

        Ok(canvas)
    }

    /// Date rendered glyph by glyph; `-` uses the line sprite, and each
    /// glyph's own width advances the cursor.
    fn draw_date_strip(
        &self,
        canvas: &mut Canvas,
        weather: &WeatherSnapshot,
    ) -> Result<(), RenderError> {
        let text = weather.date.format("%Y-%m-%d").to_string();
        let (mut x, y) = self.layout.date_origin;
        for ch in text.chars() {
            let sprite = if ch == '-' {
                self.atlas.get("line")?
            } else {
                self.atlas.get(ch.encode_utf8(&mut [0u8; 4]))?
            };
            canvas.blit(sprite, x, y);
            x += sprite.width() as i32;
        }
        Ok(())
    }

    fn draw_weekday(&self, canvas: &mut Canvas, weekday: &str) -> Result<(), RenderError> {
        let (x, y) = self.layout.weekday_origin;
        canvas.blit(self.atlas.get(weekday)?, x, y);
        Ok(())
    }

    /// Digit/decimal-point strip; returns the cursor after the last glyph
    /// so the caller can append a unit sprite.
    fn blit_value_strip(
        &self,
        canvas: &mut Canvas,
        text: &str,
        mut x: i32,
        y: i32,
    ) -> Result<i32, RenderError> {
        for ch in text.chars() {
            let sprite = if ch == '.' {
                self.atlas.get("dot")?
            } else {
                self.atlas.get(ch.encode_utf8(&mut [0u8; 4]))?
            };
            canvas.blit(sprite, x, y);
            x += sprite.width() as i32;
        }
        Ok(x)
    }

    fn draw_cpu_strip(
        &self,
        canvas: &mut Canvas,
        system: &SystemSnapshot,
    ) -> Result<(), RenderError> {
        let (icon_x, icon_y) = self.layout.cpu_icon_origin;
        canvas.blit(self.atlas.get("cpu")?, icon_x, icon_y);

        let (x, y) = self.layout.cpu_digits_origin;
        let end = self.blit_value_strip(canvas, &format_cpu(system.cpu_percent), x, y)?;
        canvas.blit(self.atlas.get("percent")?, end + 1, y);
        Ok(())
    }

    fn draw_memory_strips(
        &self,
        canvas: &mut Canvas,
        system: &SystemSnapshot,
    ) -> Result<(), RenderError> {
        let (icon_x, icon_y) = self.layout.mem_icon_origin;
        canvas.blit(self.atlas.get("mem")?, icon_x, icon_y);

        let (x, y) = self.layout.mem_digits_origin;
        let end = self.blit_value_strip(canvas, &format_mem_total(system.mem_total_gib), x, y)?;
        canvas.blit(self.atlas.get("gib")?, end + 1, y);

        let pct = system.mem_percent.to_string();
        let pct_x = self.layout.mem_percent_x(pct.len());
        let end = self.blit_value_strip(canvas, &pct, pct_x, y)?;
        canvas.blit(self.atlas.get("percent")?, end + 1, y);
        Ok(())
    }

    /// Per-core utilization panel: one frame sprite per template, one
    /// bucket cell per core, at most eight cells. The 6-core template
    /// inserts one extra pixel of spacing after the first and fifth cell.
    fn draw_core_panel(
        &self,
        canvas: &mut Canvas,
        system: &SystemSnapshot,
    ) -> Result<(), RenderError> {
        let template = system.panel_template();
        let (frame_x, frame_y) = self.layout.core_frame_origin;
        canvas.blit(self.atlas.get(&format!("cores_{template}_frame"))?, frame_x, frame_y);

        let pitch = self.layout.core_pitch(template);
        let (mut x, y) = self.layout.core_cells_origin;
        for (i, &pct) in system.core_percents.iter().take(8).enumerate() {
            let bucket = utilization_bucket(pct);
            canvas.blit(self.atlas.get(&format!("cores_{template}_{bucket}"))?, x, y);
            let extra = if template == 6 && (i == 0 || i == 4) { 1 } else { 0 };
            x += pitch + extra;
        }
        Ok(())
    }

    fn draw_weather_panel(
        &self,
        canvas: &mut Canvas,
        weather: &WeatherSnapshot,
    ) -> Result<(), RenderError> {
        let l = &self.layout;
        canvas.blit(self.atlas.get(&weather.icon_day)?, l.icon_day_origin.0, l.icon_day_origin.1);
        canvas.blit(
            self.atlas.get(&weather.icon_night)?,
            l.icon_night_origin.0,
            l.icon_night_origin.1,
        );
        canvas.blit(self.atlas.get(&weather.text_day)?, l.text_day_origin.0, l.text_day_origin.1);
        canvas.blit(
            self.atlas.get(&weather.text_night)?,
            l.text_night_origin.0,
            l.text_night_origin.1,
        );
        let wave = self.atlas.get("wave")?;
        for (x, y) in l.wave_origins {
            canvas.blit(wave, x, y);
        }
        Ok(())
    }

    /// City name stacked vertically, one font glyph per row.
    fn draw_city_name(&self, canvas: &mut Canvas, city: &str) {
        let (mut y, pitch) = self.layout.city_column(city.chars().count());
        let style = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);
        for ch in city.chars() {
            let mut buf = [0u8; 4];
            Text::with_baseline(
                ch.encode_utf8(&mut buf),
                Point::new(self.layout.city_column_x, y),
                style,
                Baseline::Top,
            )
            .draw(canvas)
            .ok();
            y += pitch;
        }
    }

    /// One temperature strip: digits (and the minus sprite) at a 12px
    /// pitch, unit sprite appended after the last glyph.
    fn blit_temp_strip(
        &self,
        canvas: &mut Canvas,
        text: &str,
        x: i32,
        y: i32,
    ) -> Result<(), RenderError> {
        for (i, ch) in text.chars().enumerate() {
            let sprite = if ch == '-' {
                self.atlas.get("minus")?
            } else {
                self.atlas.get(ch.encode_utf8(&mut [0u8; 4]))?
            };
            canvas.blit(sprite, x + i as i32 * self.layout.digit_pitch, y);
        }
        let len = text.chars().count() as i32;
        canvas.blit(self.atlas.get("temp_unit")?, x + len * self.layout.digit_pitch, y);
        Ok(())
    }

    fn draw_temperature_strips(
        &self,
        canvas: &mut Canvas,
        weather: &WeatherSnapshot,
    ) -> Result<(), RenderError> {
        let l = &self.layout;
        let min_text = weather.temp_min.to_string();
        let max_text = weather.temp_max.to_string();
        let now_text = weather.temp_now.to_string();

        let min_x = l
            .centered_temp_x(min_text.len())
            .ok_or(RenderError::UnsupportedLength {
                what: "min temperature",
                len: min_text.len(),
            })?;
        let max_x = l.half_width
            + l.centered_temp_x(max_text.len())
                .ok_or(RenderError::UnsupportedLength {
                    what: "max temperature",
                    len: max_text.len(),
                })?;
        let (label_x, now_x) =
            l.now_origins(now_text.len())
                .ok_or(RenderError::UnsupportedLength {
                    what: "current temperature",
                    len: now_text.len(),
                })?;

        self.blit_temp_strip(canvas, &min_text, min_x, l.minmax_row)?;
        self.blit_temp_strip(canvas, &max_text, max_x, l.minmax_row)?;
        self.blit_temp_strip(canvas, &now_text, now_x, l.now_row)?;
        canvas.blit(self.atlas.get("current_temp")?, label_x, l.now_label_row);
        Ok(())
    }

    /// Minutely precipitation: the sentinel summary gets a canned sprite;
    /// anything else is wrapped text, 12 glyphs per line, vertically
    /// centered, with digits advancing the cursor less than other glyphs.
    fn draw_precipitation(
        &self,
        canvas: &mut Canvas,
        weather: &WeatherSnapshot,
        weekday: &str,
    ) -> Result<(), RenderError> {
        if weather.minutely_summary == self.no_precip_sentinel {
            let (x, y) = self.layout.no_rain_origin;
            canvas.blit(self.atlas.get(&format!("{weekday}_no_rain"))?, x, y);
            return Ok(());
        }

        let chars: Vec<char> = weather.minutely_summary.chars().collect();
        let lines = chars.len().div_ceil(12) as i32;
        let mut y = 255 - lines * 11 / 2;

        let digits = chars.iter().filter(|c| c.is_ascii_digit()).count() as i32;
        let others = chars.len() as i32 - digits;
        let mut left = 52 - (digits * 5 + others * 10) / 2;
        if left < 5 {
            left = 0;
        }

        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let mut advance = 0;
        for ch in chars {
            advance += 10;
            if advance > 108 {
                advance = 1;
                left = 10;
                y += 11;
            }
            let mut buf = [0u8; 4];
            Text::with_baseline(
                ch.encode_utf8(&mut buf),
                Point::new(left + advance, y),
                style,
                Baseline::Top,
            )
            .draw(canvas)
            .ok();
            if ch.is_ascii_digit() {
                advance -= 4;
            }
        }
        Ok(())
    }
}

/// Aggregate CPU text: integer at or above 10, one decimal below.
fn format_cpu(percent: f32) -> String {
    if percent >= 10.0 {
        format!("{}", percent as u32)
    } else {
        format!("{percent:.1}")
    }
}

/// Total memory text: one decimal, except 4-5 character values collapse
/// to the integer.
fn format_mem_total(gib: f64) -> String {
    let text = format!("{gib:.1}");
    if text.len() == 4 || text.len() == 5 {
        format!("{}", gib.round() as u64)
    } else {
        text
    }
}

/// Utilization bucket for a core cell sprite. 10% buckets, except the top
/// of the ramp: [90, 94) maps to 90 and [94, 100] to 100. Values past 100
/// fall back to the empty cell.
fn utilization_bucket(percent: f32) -> u32 {
    match percent {
        p if p < 10.0 => 0,
        p if p < 20.0 => 10,
        p if p < 30.0 => 20,
        p if p < 40.0 => 30,
        p if p < 50.0 => 40,
        p if p < 60.0 => 50,
        p if p < 70.0 => 60,
        p if p < 80.0 => 70,
        p if p < 90.0 => 80,
        p if p < 94.0 => 90,
        p if p <= 100.0 => 100,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::Sprite;

    fn weather() -> WeatherSnapshot {
        WeatherSnapshot {
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
        }
    }

    fn system(cores: Vec<f32>) -> SystemSnapshot {
        SystemSnapshot {
            cpu_percent: 55.0,
            core_percents: cores,
            mem_total_gib: 16.0,
            mem_percent: 60,
        }
    }

    fn test_atlas() -> GlyphAtlas {
        let mut atlas = GlyphAtlas::synthetic();
        atlas.insert("100", Sprite::solid(52, 52, [0, 0, 0]));
        atlas.insert("150", Sprite::solid(52, 52, [0, 0, 0]));
        atlas.insert("Sunny", Sprite::solid(56, 20, [0, 0, 0]));
        atlas.insert("Clear", Sprite::solid(56, 20, [0, 0, 0]));
        atlas
    }

    fn compositor(atlas: &GlyphAtlas) -> Compositor<'_> {
        Compositor::new(atlas, Layout::default(), "No precipitation within two hours")
    }

    #[test]
    fn renders_full_scene_with_synthetic_atlas() {
        let atlas = test_atlas();
        let canvas = compositor(&atlas)
            .render(&weather(), &system(vec![10.0, 20.0, 85.0, 40.0]))
            .expect("render should succeed with a complete atlas");

        // Date strip spans the documented band: 10 glyphs × 12px from x=4
        assert_eq!(canvas.pixel(4, 9), [0, 0, 0]);
        assert_eq!(canvas.pixel(123, 9), [0, 0, 0]);
        assert_eq!(canvas.pixel(3, 9), [255, 255, 255]);
    }

    #[test]
    fn missing_icon_key_is_fatal_and_named() {
        let mut atlas = GlyphAtlas::synthetic();
        // Only the day icon; night icon missing
        atlas.insert("100", Sprite::solid(52, 52, [0, 0, 0]));
        atlas.insert("Sunny", Sprite::solid(56, 20, [0, 0, 0]));
        atlas.insert("Clear", Sprite::solid(56, 20, [0, 0, 0]));

        let err = compositor(&atlas)
            .render(&weather(), &system(vec![0.0; 4]))
            .unwrap_err();
        match err {
            RenderError::MissingAsset(e) => assert_eq!(e.key, "150"),
            other => panic!("expected MissingAsset, got {other:?}"),
        }
    }

    #[test]
    fn centering_table_matches_closed_form() {
        let layout = Layout::default();
        assert_eq!(layout.centered_temp_x(1), Some(22));
        assert_eq!(layout.centered_temp_x(2), Some(16));
        assert_eq!(layout.centered_temp_x(3), Some(10));
        assert_eq!(layout.centered_temp_x(4), None);
        assert_eq!(layout.centered_temp_x(0), None);
    }

    #[test]
    fn four_digit_temperature_is_rejected() {
        let atlas = test_atlas();
        let mut snap = weather();
        snap.temp_now = 1000;
        let err = compositor(&atlas)
            .render(&snap, &system(vec![0.0; 4]))
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedLength { len: 4, .. }));
    }

    #[test]
    fn mem_percent_offsets_follow_length_table() {
        let layout = Layout::default();
        assert_eq!(layout.mem_percent_x(3), 75);
        assert_eq!(layout.mem_percent_x(2), 87);
        assert_eq!(layout.mem_percent_x(1), 99);
    }

    #[test]
    fn core_panel_draws_at_most_eight_cells() {
        let mut atlas = test_atlas();
        // Red cells so drawn cells are countable against the black frame
        atlas.insert("cores_8_0", Sprite::solid(3, 16, [255, 0, 0]));

        let canvas = compositor(&atlas)
            .render(&weather(), &system(vec![0.0; 12]))
            .unwrap();
        let red = canvas
            .as_image()
            .pixels()
            .filter(|p| p.0 == [255, 0, 0])
            .count();
        assert_eq!(red, 8 * 3 * 16, "12 cores must still render 8 cells");
    }

    #[test]
    fn six_core_template_inserts_extra_spacing() {
        let mut atlas = test_atlas();
        atlas.insert("cores_6_0", Sprite::solid(1, 16, [255, 0, 0]));

        let canvas = compositor(&atlas)
            .render(&weather(), &system(vec![0.0; 6]))
            .unwrap();

        // Pitch 5 plus one extra pixel after the first and fifth cell
        for x in [90, 96, 101, 106, 111, 117] {
            assert_eq!(canvas.pixel(x, 57), [255, 0, 0], "expected cell at x={x}");
        }
        for x in [95, 100, 116] {
            assert_ne!(canvas.pixel(x, 57), [255, 0, 0], "no cell expected at x={x}");
        }
    }

    #[test]
    fn sentinel_summary_uses_canned_sprite() {
        let mut atlas = test_atlas();
        atlas.insert("Monday_no_rain", Sprite::solid(128, 56, [0, 0, 255]));

        let canvas = compositor(&atlas)
            .render(&weather(), &system(vec![0.0; 4]))
            .unwrap();
        assert_eq!(canvas.pixel(0, 227), [0, 0, 255]);
    }

    #[test]
    fn non_sentinel_summary_renders_wrapped_text() {
        let atlas = test_atlas();
        let mut snap = weather();
        snap.minutely_summary = "Light rain starting in 23 minutes".into();

        let canvas = compositor(&atlas).render(&snap, &system(vec![0.0; 4])).unwrap();
        let band_ink = (227..280)
            .flat_map(|y| (0..128).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == [0, 0, 0])
            .count();
        assert!(band_ink > 0, "wrapped summary text should ink the bottom band");
    }

    #[test]
    fn cpu_text_formatting_threshold() {
        assert_eq!(format_cpu(55.4), "55");
        assert_eq!(format_cpu(100.0), "100");
        assert_eq!(format_cpu(10.0), "10");
        assert_eq!(format_cpu(9.5), "9.5");
        assert_eq!(format_cpu(0.0), "0.0");
    }

    #[test]
    fn mem_total_formatting_collapses_wide_values() {
        assert_eq!(format_mem_total(16.0), "16"); // "16.0" is 4 chars
        assert_eq!(format_mem_total(128.0), "128"); // "128.0" is 5 chars
        assert_eq!(format_mem_total(8.0), "8.0"); // 3 chars, kept as-is
    }

    #[test]
    fn utilization_buckets_cover_the_ramp() {
        assert_eq!(utilization_bucket(0.0), 0);
        assert_eq!(utilization_bucket(9.9), 0);
        assert_eq!(utilization_bucket(10.0), 10);
        assert_eq!(utilization_bucket(89.9), 80);
        assert_eq!(utilization_bucket(93.9), 90);
        assert_eq!(utilization_bucket(94.0), 100);
        assert_eq!(utilization_bucket(100.0), 100);
        assert_eq!(utilization_bucket(150.0), 0);
    }
}
