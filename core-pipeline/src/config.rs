//! Engine constants that are not part of the user-facing settings.

use core_media::{IMAGE_EXTENSIONS, OUTPUT_EXTENSION};
use std::time::Duration;

/// Default copy chunk: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default stop-check granularity between cycles.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bytes requested per remote read during a mirror copy.
    pub chunk_size: usize,
    /// Sleep granularity; a stop request is observed within one tick.
    pub tick: Duration,
    /// Extension given to transcoded files.
    pub output_extension: String,
    /// Input extensions the transcode stage picks up.
    pub image_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tick: DEFAULT_TICK,
            output_extension: OUTPUT_EXTENSION.to_string(),
            image_extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 1_048_576);
        assert_eq!(config.tick, Duration::from_millis(100));
        assert_eq!(config.output_extension, "jpg");
        assert!(config.image_extensions.iter().any(|e| e == "tif"));
    }

    #[test]
    fn test_builders_clamp_to_minimums() {
        let config = PipelineConfig::default()
            .with_chunk_size(0)
            .with_tick(Duration::ZERO);
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.tick, Duration::from_millis(1));
    }
}
