//! The render surface.
//!
//! A [`Canvas`] is the fixed 128×296 RGB raster one frame is composited
//! onto. It starts white, the compositor owns it for the duration of a
//! single render, and it is discarded after binarization.
//!
//! Sprites are copied in with [`Canvas::blit`]; font-rendered text goes
//! through the [`DrawTarget`] implementation so the embedded-graphics mono
//! fonts draw directly onto the raster. Both paths clip at the canvas
//! edges rather than panicking.

use crate::atlas::Sprite;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use image::{Rgb, RgbImage};
use std::convert::Infallible;
use std::path::Path;

/// Display width in pixels. Must stay divisible by 8 for the binarizer's
/// row packing.
pub const CANVAS_WIDTH: u32 = 128;
/// Display height in pixels.
pub const CANVAS_HEIGHT: u32 = 296;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Fixed-size RGB raster, origin top-left, initialized white.
#[derive(Debug)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            image: RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, WHITE),
        }
    }

    pub fn width(&self) -> u32 {
        CANVAS_WIDTH
    }

    pub fn height(&self) -> u32 {
        CANVAS_HEIGHT
    }

    /// Copy a sprite onto the canvas with its top-left corner at (x, y).
    /// Sprites have no transparency; every pixel is copied. Parts falling
    /// outside the canvas are clipped.
    pub fn blit(&mut self, sprite: &Sprite, x: i32, y: i32) {
        for (sx, sy, pixel) in sprite.image().enumerate_pixels() {
            let dx = x + sx as i32;
            let dy = y + sy as i32;
            if dx >= 0 && dy >= 0 && (dx as u32) < CANVAS_WIDTH && (dy as u32) < CANVAS_HEIGHT {
                self.image.put_pixel(dx as u32, dy as u32, *pixel);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Persist the composited canvas as a PNG for diagnostics. Not part of
    /// the transmit path.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
        self.image.save(path)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < CANVAS_WIDTH
                && (point.y as u32) < CANVAS_HEIGHT
            {
                let rgb = match color {
                    BinaryColor::On => BLACK,
                    BinaryColor::Off => WHITE,
                };
                self.image.put_pixel(point.x as u32, point.y as u32, rgb);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mono_font::ascii::FONT_6X10;
    use embedded_graphics::mono_font::MonoTextStyle;
    use embedded_graphics::text::{Baseline, Text};

    #[test]
    fn canvas_starts_white() {
        let canvas = Canvas::new();
        assert_eq!(canvas.pixel(0, 0), [255, 255, 255]);
        assert_eq!(canvas.pixel(CANVAS_WIDTH - 1, CANVAS_HEIGHT - 1), [255, 255, 255]);
    }

    #[test]
    fn blit_copies_and_clips() {
        let mut canvas = Canvas::new();
        let sprite = Sprite::solid(10, 10, [0, 0, 0]);

        // Hang the sprite off the right edge; no panic, visible part lands
        canvas.blit(&sprite, CANVAS_WIDTH as i32 - 4, 0);
        assert_eq!(canvas.pixel(CANVAS_WIDTH - 1, 5), [0, 0, 0]);
        assert_eq!(canvas.pixel(CANVAS_WIDTH - 5, 5), [255, 255, 255]);
    }

    #[test]
    fn text_draws_through_draw_target() {
        let mut canvas = Canvas::new();
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_baseline("W", Point::new(2, 2), style, Baseline::Top)
            .draw(&mut canvas)
            .ok();

        let inked = canvas
            .as_image()
            .pixels()
            .filter(|p| p.0 == [0, 0, 0])
            .count();
        assert!(inked > 0, "mono-font text should set pixels on the canvas");
    }

    #[test]
    fn text_outside_canvas_is_clipped_not_panicking() {
        let mut canvas = Canvas::new();
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        Text::with_baseline(
            "clip",
            Point::new(CANVAS_WIDTH as i32 - 3, CANVAS_HEIGHT as i32 - 3),
            style,
            Baseline::Top,
        )
        .draw(&mut canvas)
        .ok();
    }
}
