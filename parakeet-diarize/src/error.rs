use thiserror::Error;

/// Error kinds surfaced by the diarization pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("model output missing required feature: {0}")]
    MissingFeature(String),

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    #[error("unknown centroid id: {0}")]
    UnknownCentroid(String),
}

impl From<parakeet_tensor::Error> for Error {
    fn from(e: parakeet_tensor::Error) -> Self {
        match e {
            parakeet_tensor::Error::InvalidRank { .. } | parakeet_tensor::Error::ShapeMismatch { .. } => {
                Error::InvalidShape(e.to_string())
            }
            other => Error::ProcessingFailed(other.to_string()),
        }
    }
}

impl From<parakeet_model::Error> for Error {
    fn from(e: parakeet_model::Error) -> Self {
        match e {
            parakeet_model::Error::ModelUnavailable(network) => {
                Error::ModelUnavailable(network.to_string())
            }
            parakeet_model::Error::MissingOutput(name) => Error::MissingFeature(name),
            parakeet_model::Error::Tensor(t) => t.into(),
            parakeet_model::Error::Failed(msg) => Error::ProcessingFailed(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
