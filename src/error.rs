use thiserror::Error;

/// Failures a pipeline run can end with.
///
/// Collaborators report `anyhow` errors; the orchestrator folds them into the
/// variant of the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Remote asset provider failure. Recovered inside the asset fetcher.
    #[error("asset provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("content generation failed: {0}")]
    Generation(String),

    #[error("narration synthesis failed: {0}")]
    Synthesis(String),

    #[error("composition failed: {0}")]
    Composition(String),

    #[error("thumbnail extraction failed: {0}")]
    Thumbnail(String),

    #[error("publishing failed: {0}")]
    Publish(String),

    #[error("script contains no usable sentences")]
    EmptyScript,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
