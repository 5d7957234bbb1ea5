//! Sprite storage for the compositor.
//!
//! Every visual element except font-rendered text comes out of a
//! [`GlyphAtlas`]: digit and punctuation glyphs, unit marks, weekday
//! labels, weather icons, condition-text strips, and the core-panel frames
//! and cells. Sprites are looked up by string key. For most keys the key
//! is exactly the asset's file stem, so the atlas contents are defined by
//! whatever the asset directory ships.
//!
//! The atlas is loaded once at startup and only read afterwards.

use image::RgbImage;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// A sprite key the compositor asked for does not exist in the atlas.
///
/// Fatal for the render that requested it; the key is carried for the log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing sprite asset: {key:?}")]
pub struct MissingAssetError {
    pub key: String,
}

/// Errors while reading the asset directory.
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("asset directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("asset decode: {0}")]
    Image(#[from] image::ImageError),
}

/// An immutable bitmap with known pixel dimensions.
#[derive(Clone, Debug)]
pub struct Sprite {
    image: RgbImage,
}

impl Sprite {
    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// A single-color sprite, used by [`GlyphAtlas::synthetic`].
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// String-keyed sprite lookup table.
pub struct GlyphAtlas {
    sprites: HashMap<String, Sprite>,
}

impl GlyphAtlas {
    pub fn new() -> Self {
        Self {
            sprites: HashMap::new(),
        }
    }

    /// Load every `.png`/`.jpg`/`.jpeg` in `dir`; the file stem becomes
    /// the sprite key. Other files are ignored.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, AtlasError> {
        let mut atlas = Self::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_image = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("png" | "jpg" | "jpeg")
            );
            if !is_image {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let image = image::open(&path)?.to_rgb8();
            atlas.sprites.insert(stem.to_string(), Sprite::from_image(image));
        }
        info!(
            count = atlas.sprites.len(),
            dir = %dir.as_ref().display(),
            "glyph atlas loaded"
        );
        Ok(atlas)
    }

    pub fn insert(&mut self, key: impl Into<String>, sprite: Sprite) {
        self.sprites.insert(key.into(), sprite);
    }

    pub fn get(&self, key: &str) -> Result<&Sprite, MissingAssetError> {
        self.sprites.get(key).ok_or_else(|| MissingAssetError {
            key: key.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// A substitution atlas of solid black sprites covering the standard
    /// key set at the production sprite dimensions. Weather icon and
    /// condition-text keys depend on the acquisition source, so tests add
    /// those with [`GlyphAtlas::insert`].
    pub fn synthetic() -> Self {
        let mut atlas = Self::new();
        let black = [0u8, 0, 0];

        // Digit-strip glyphs share the 12px advance the layout assumes.
        for d in 0..10u8 {
            atlas.insert(d.to_string(), Sprite::solid(12, 14, black));
        }
        atlas.insert("line", Sprite::solid(12, 14, black));
        atlas.insert("minus", Sprite::solid(12, 14, black));
        atlas.insert("dot", Sprite::solid(6, 14, black));
        atlas.insert("percent", Sprite::solid(10, 14, black));
        atlas.insert("gib", Sprite::solid(10, 14, black));
        atlas.insert("cpu", Sprite::solid(16, 14, black));
        atlas.insert("mem", Sprite::solid(16, 14, black));
        atlas.insert("temp_unit", Sprite::solid(8, 8, black));
        atlas.insert("current_temp", Sprite::solid(20, 12, black));
        atlas.insert("wave", Sprite::solid(12, 4, black));

        for weekday in [
            "Monday",
            "Tuesday",
            "Wednesday",
            "Thursday",
            "Friday",
            "Saturday",
            "Sunday",
        ] {
            atlas.insert(weekday, Sprite::solid(64, 20, black));
            atlas.insert(format!("{weekday}_no_rain"), Sprite::solid(128, 56, black));
        }

        // Core panel: one frame per template plus a cell sprite per
        // utilization bucket, sized to the template's cell pitch.
        for (count, cell_width) in [(2u32, 15u32), (4, 7), (6, 4), (8, 3)] {
            atlas.insert(format!("cores_{count}_frame"), Sprite::solid(38, 20, black));
            for bucket in [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100] {
                atlas.insert(
                    format!("cores_{count}_{bucket}"),
                    Sprite::solid(cell_width, 16, black),
                );
            }
        }

        atlas
    }
}

impl Default for GlyphAtlas {
    fn default() -> Self {
        Self::new()
    }
}
