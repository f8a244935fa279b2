use thiserror::Error;

/// Failures that end a fetch or analyze cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("content source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
    #[error("store write failed: {0:#}")]
    StoreWrite(anyhow::Error),
    #[error("store read failed: {0:#}")]
    StoreRead(anyhow::Error),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable(_) => "source_unavailable",
            PipelineError::StoreWrite(_) => "store_write",
            PipelineError::StoreRead(_) => "store_read",
        }
    }
}
