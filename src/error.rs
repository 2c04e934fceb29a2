use thiserror::Error;

/// Errors raised by the latency pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no samples to process")]
    EmptyInput,

    #[error("provider '{provider}' has an invalid latency sample: {latency}")]
    InvalidSample { provider: String, latency: f64 },

    #[error("provider '{provider}' has no valid samples to smooth")]
    InsufficientData { provider: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
