use crate::Network;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model unavailable: {0}")]
    ModelUnavailable(Network),

    #[error("model output missing required tensor {0:?}")]
    MissingOutput(String),

    #[error("tensor error: {0}")]
    Tensor(#[from] parakeet_tensor::Error),

    #[error("model inference failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
