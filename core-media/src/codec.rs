//! `image`-crate implementation of the codec capability.

use bridge_traits::{
    error::{BridgeError, Result},
    media::{ImageCodec, PixelLayout, Raster},
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageBuffer, Pixel};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Codec backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    pub fn new() -> Self {
        Self
    }
}

fn codec_error(path: &Path, err: impl std::fmt::Display) -> BridgeError {
    BridgeError::Codec(format!("{}: {}", path.display(), err))
}

fn resize_buffer<P>(raster: &Raster, width: u32, height: u32) -> Result<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let buffer: ImageBuffer<P, Vec<u8>> =
        ImageBuffer::from_raw(raster.width, raster.height, raster.pixels.clone()).ok_or_else(
            || BridgeError::Codec("raster buffer does not match its dimensions".to_string()),
        )?;
    Ok(image::imageops::resize(&buffer, width, height, FilterType::Lanczos3).into_raw())
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, path: &Path) -> Result<Raster> {
        let img = image::open(path).map_err(|e| codec_error(path, e))?;
        let (width, height) = (img.width(), img.height());

        let raster = if img.color().has_alpha() {
            Raster::new(width, height, PixelLayout::Rgba8, img.to_rgba8().into_raw())
        } else {
            Raster::new(width, height, PixelLayout::Rgb8, img.to_rgb8().into_raw())
        };
        debug!(path = ?path, width, height, alpha = raster.has_alpha(), "Decoded image");
        Ok(raster)
    }

    fn resize_keep_aspect(&self, raster: Raster, width: u32) -> Result<Raster> {
        if width == 0 {
            return Err(BridgeError::Codec("target width must be positive".to_string()));
        }
        if width == raster.width {
            return Ok(raster);
        }
        let height = raster.scaled_height(width);
        let pixels = match raster.layout {
            PixelLayout::Rgb8 => resize_buffer::<image::Rgb<u8>>(&raster, width, height)?,
            PixelLayout::Rgba8 => resize_buffer::<image::Rgba<u8>>(&raster, width, height)?,
        };
        Ok(Raster::new(width, height, raster.layout, pixels))
    }

    fn encode_jpeg(&self, raster: &Raster, path: &Path, quality: u8) -> Result<u64> {
        let flattened;
        let rgb = if raster.has_alpha() {
            flattened = raster.clone().flatten_on_white();
            &flattened
        } else {
            raster
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100))
            .encode(&rgb.pixels, rgb.width, rgb.height, ExtendedColorType::Rgb8)
            .map_err(|e| codec_error(path, e))?;
        writer.flush()?;
        drop(writer);

        Ok(std::fs::metadata(path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_decode_rgba_png_keeps_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 0])).save(&path).unwrap();

        let raster = ImageRsCodec.decode(&path).unwrap();

        assert_eq!((raster.width, raster.height), (4, 2));
        assert_eq!(raster.layout, PixelLayout::Rgba8);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(matches!(
            ImageRsCodec.decode(&path),
            Err(BridgeError::Codec(_))
        ));
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let raster = Raster::new(10, 6, PixelLayout::Rgb8, vec![128; 10 * 6 * 3]);

        let resized = ImageRsCodec.resize_keep_aspect(raster, 5).unwrap();

        assert_eq!((resized.width, resized.height), (5, 3));
        assert_eq!(resized.pixels.len(), 5 * 3 * 3);
    }

    #[test]
    fn test_encode_jpeg_writes_decodable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let source = RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]));
        let raster = Raster::new(8, 8, PixelLayout::Rgb8, source.into_raw());

        let written = ImageRsCodec.encode_jpeg(&raster, &path, 85).unwrap();

        assert!(written > 0);
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_encode_jpeg_flattens_alpha() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let raster = Raster::new(2, 2, PixelLayout::Rgba8, vec![0, 0, 0, 0].repeat(4));

        ImageRsCodec.encode_jpeg(&raster, &path, 90).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        let px = decoded.get_pixel(0, 0);
        assert!(px.0.iter().all(|&c| c > 240));
    }
}
