//! Image Codec Abstraction
//!
//! The transcoder works on a neutral [`Raster`] so it does not depend on any
//! particular imaging library. Hosts provide an [`ImageCodec`] that can decode
//! files into rasters, resize them and write JPEG output.

use std::path::Path;

use crate::{error::Result, platform::PlatformSendSync};

/// Pixel layout of a [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// Decoded 8-bit image, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            pixels,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.layout == PixelLayout::Rgba8
    }

    /// Height after scaling to `target_width` with the aspect ratio kept.
    ///
    /// Rounds down and never returns less than one row.
    pub fn scaled_height(&self, target_width: u32) -> u32 {
        if self.width == 0 {
            return self.height.max(1);
        }
        let height = u64::from(self.height) * u64::from(target_width) / u64::from(self.width);
        height.clamp(1, u64::from(u32::MAX)) as u32
    }

    /// Blend every pixel over an opaque white background and drop alpha.
    ///
    /// Rasters without alpha are returned unchanged.
    pub fn flatten_on_white(self) -> Raster {
        if !self.has_alpha() {
            return self;
        }
        let mut rgb = Vec::with_capacity(self.pixels.len() / 4 * 3);
        for px in self.pixels.chunks_exact(4) {
            let alpha = u32::from(px[3]);
            for &channel in &px[..3] {
                let blended = (u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
                rgb.push(blended as u8);
            }
        }
        Raster::new(self.width, self.height, PixelLayout::Rgb8, rgb)
    }
}

/// Image codec capability.
///
/// All methods are synchronous and CPU-bound; callers run them on a blocking
/// worker.
pub trait ImageCodec: PlatformSendSync {
    /// Decode the file at `path`.
    ///
    /// Grayscale and palette images come back as RGB, or RGBA when they carry
    /// transparency.
    fn decode(&self, path: &Path) -> Result<Raster>;

    /// Resize to `width` keeping the aspect ratio (see [`Raster::scaled_height`]).
    fn resize_keep_aspect(&self, raster: Raster, width: u32) -> Result<Raster>;

    /// Composite onto white, yielding an RGB raster.
    fn composite_on_white(&self, raster: Raster) -> Raster {
        raster.flatten_on_white()
    }

    /// Encode as JPEG at `quality` (1-100) and write to `path`.
    ///
    /// Returns the number of bytes written.
    fn encode_jpeg(&self, raster: &Raster, path: &Path, quality: u8) -> Result<u64>;
}
