use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The endpoint could not be reached or refused the session.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for failures that invalidate the whole session rather than one item.
    pub fn is_connection(&self) -> bool {
        matches!(self, BridgeError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
