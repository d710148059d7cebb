use thiserror::Error;

/// Errors surfaced to callers of the pipeline.
///
/// Everything else (strategy failures, transport failures, validation
/// failures, cache outages) is recovered inside the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize cache entry: {0}")]
    Serialization(String),

    #[error("Invalid cached payload: {0}")]
    Payload(String),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}
