//! # Transcoder
//!
//! Converts one input image into one normalized JPEG.
//!
//! The pipeline for a single file is:
//!
//! 1. decode (grayscale and palette images arrive as RGB/RGBA)
//! 2. composite transparent pixels onto white
//! 3. optionally resize to the target width, keeping the aspect ratio
//! 4. encode as JPEG at the configured quality
//!
//! All steps are CPU-bound and run on `core_async::task::spawn_blocking`.

use crate::error::{MediaError, Result};
use bridge_traits::media::ImageCodec;
use core_async::task;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File extensions treated as images, lowercase and without the dot.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Extension given to every output file.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Quality and size settings for one transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodePolicy {
    pub quality: u8,
    pub resize_width: Option<u32>,
}

impl TranscodePolicy {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            resize_width: None,
        }
    }

    pub fn with_resize_width(mut self, width: Option<u32>) -> Self {
        self.resize_width = width;
        self
    }
}

/// Result of transcoding one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub original_bytes: u64,
    pub output_bytes: u64,
    /// Decoded source dimensions.
    pub original_width: u32,
    pub original_height: u32,
    /// Encoded output dimensions.
    pub width: u32,
    pub height: u32,
}

impl TranscodeOutcome {
    /// Bytes saved; negative when the output is larger than the input.
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.output_bytes as i64
    }

    /// `"WxH -> WxH"`, source first.
    pub fn dimensions(&self) -> String {
        format!(
            "{}x{} -> {}x{}",
            self.original_width, self.original_height, self.width, self.height
        )
    }
}

/// Image transcoder over an [`ImageCodec`].
#[derive(Clone)]
pub struct Transcoder {
    codec: Arc<dyn ImageCodec>,
    extensions: Vec<String>,
    output_extension: String,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("extensions", &self.extensions)
            .field("output_extension", &self.output_extension)
            .finish_non_exhaustive()
    }
}

impl Transcoder {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            output_extension: OUTPUT_EXTENSION.to_string(),
        }
    }

    /// Replace the recognised input extensions (case-insensitive, no dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_output_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.output_extension = extension.as_ref().trim_start_matches('.').to_string();
        self
    }

    /// `true` if `path` has one of the recognised image extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == lower)
            })
            .unwrap_or(false)
    }

    /// Output location for `input`: same relative path under `output_root`
    /// with the extension replaced.
    pub fn output_path(&self, input_root: &Path, output_root: &Path, input: &Path) -> Result<PathBuf> {
        let relative = input
            .strip_prefix(input_root)
            .map_err(|_| MediaError::OutsideRoot(input.display().to_string()))?;
        Ok(output_root
            .join(relative)
            .with_extension(&self.output_extension))
    }

    /// Transcode `input` into `output`, creating parent directories.
    pub async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        policy: TranscodePolicy,
    ) -> Result<TranscodeOutcome> {
        if !self.accepts(input) {
            return Err(MediaError::UnsupportedFormat(input.display().to_string()));
        }

        let codec = Arc::clone(&self.codec);
        let input = input.to_path_buf();
        let output = output.to_path_buf();

        task::spawn_blocking(move || transcode_blocking(codec.as_ref(), &input, &output, policy))
            .await
            .map_err(|e| MediaError::Task(e.to_string()))?
    }
}

fn transcode_blocking(
    codec: &dyn ImageCodec,
    input: &Path,
    output: &Path,
    policy: TranscodePolicy,
) -> Result<TranscodeOutcome> {
    let original_bytes = std::fs::metadata(input)?.len();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let raster = codec.decode(input)?;
    let (original_width, original_height) = (raster.width, raster.height);
    let raster = if raster.has_alpha() {
        codec.composite_on_white(raster)
    } else {
        raster
    };
    let raster = match policy.resize_width {
        Some(width) => codec.resize_keep_aspect(raster, width)?,
        None => raster,
    };

    let output_bytes = codec.encode_jpeg(&raster, output, policy.quality)?;
    debug!(
        input = ?input,
        output = ?output,
        original_bytes,
        output_bytes,
        "Transcoded image"
    );

    Ok(TranscodeOutcome {
        original_bytes,
        output_bytes,
        original_width,
        original_height,
        width: raster.width,
        height: raster.height,
    })
}
