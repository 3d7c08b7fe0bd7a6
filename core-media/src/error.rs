use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Input is not under the input root: {0}")]
    OutsideRoot(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Transcode task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MediaError>;
