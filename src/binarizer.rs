//! Canvas → packed 1-bpp bitstream.
//!
//! Grayscale conversion uses the standard integer luminance weights
//! (299/587/114), then a fixed threshold splits ink from paper: below the
//! threshold is 0 (black), at or above is 1. Bits pack row-major, eight
//! per byte, most significant bit first, which is the byte layout the
//! display controller expects.
//!
//! The canvas width is divisible by 8, so rows pack without padding and
//! the output length is exactly `width × height / 8` bytes. That identity
//! is asserted, not assumed: if the canvas dimensions ever change the
//! packer must fail loudly rather than truncate a frame.

use crate::canvas::{Canvas, CANVAS_HEIGHT, CANVAS_WIDTH};

/// Packed frame size in bytes for the fixed canvas (4,736).
pub const PACKED_FRAME_LEN: usize = (CANVAS_WIDTH * CANVAS_HEIGHT / 8) as usize;

/// Integer luminance of an RGB pixel, 0-255.
fn luminance(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((r * 299 + g * 587 + b * 114) / 1000) as u8
}

/// Pack the canvas into the 1-bpp row-major bitstream.
pub fn binarize(canvas: &Canvas, threshold: u8) -> Vec<u8> {
    assert_eq!(
        canvas.width() % 8,
        0,
        "canvas width must be divisible by 8 for row packing"
    );

    let mut bytes = Vec::with_capacity(PACKED_FRAME_LEN);
    let mut current = 0u8;
    let mut filled = 0u8;

    for pixel in canvas.as_image().pixels() {
        let bit = u8::from(luminance(pixel.0) >= threshold);
        current = (current << 1) | bit;
        filled += 1;
        if filled == 8 {
            bytes.push(current);
            current = 0;
            filled = 0;
        }
    }

    assert_eq!(
        bytes.len(),
        PACKED_FRAME_LEN,
        "packed frame must be exactly {PACKED_FRAME_LEN} bytes"
    );
    bytes
}
