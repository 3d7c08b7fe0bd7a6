use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The remote endpoint could not be reached. Fatal to the current cycle.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Listing {path} failed: {message}")]
    Listing { path: String, message: String },

    #[error("{path}: {message}")]
    Item { path: String, message: String },

    #[error("Stage {stage} is already running")]
    LockConflict { stage: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Stage {stage} is not running")]
    NotRunning { stage: String },

    #[error("Stop requested")]
    Cancelled,

    #[error("Bridge error: {0}")]
    Bridge(BridgeError),

    #[error("Media error: {0}")]
    Media(#[from] core_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stage task failed: {0}")]
    Task(String),
}

impl From<BridgeError> for PipelineError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Connection(message) => PipelineError::Connection(message),
            other => PipelineError::Bridge(other),
        }
    }
}

impl From<core_runtime::Error> for PipelineError {
    fn from(err: core_runtime::Error) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

impl PipelineError {
    pub fn item(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PipelineError::Item {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
