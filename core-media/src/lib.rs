//! # Media Module
//!
//! Image transcoding for the relay pipeline.
//!
//! ## Overview
//!
//! - [`Transcoder`] decides which files are images, maps an input path to
//!   its output path and runs decode, composite, resize and encode on a
//!   blocking worker.
//! - [`ImageRsCodec`] implements the
//!   [`ImageCodec`](bridge_traits::media::ImageCodec) capability on the
//!   `image` crate (Lanczos3 resampling, baseline JPEG output).

pub mod codec;
pub mod error;
pub mod transcoder;

pub use codec::ImageRsCodec;
pub use error::{MediaError, Result};
pub use transcoder::{
    TranscodeOutcome, TranscodePolicy, Transcoder, IMAGE_EXTENSIONS, OUTPUT_EXTENSION,
};
