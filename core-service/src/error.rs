use core_pipeline::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Settings error: {0}")]
    Settings(#[from] core_runtime::Error),

    #[error("Connection test failed: {0}")]
    ConnectionTest(String),
}

impl ServiceError {
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, ServiceError::Pipeline(PipelineError::LockConflict { .. }))
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, ServiceError::Pipeline(PipelineError::NotRunning { .. }))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::Pipeline(PipelineError::Validation(_)) | ServiceError::Settings(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
