use crate::Dtype;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch: shape {shape:?} implies {expected} elements, got {len}", expected = shape.iter().product::<usize>())]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("expected a tensor of rank >= {expected_at_least}, got rank {got}")]
    InvalidRank {
        expected_at_least: usize,
        got: usize,
    },

    #[error("expected a {expected:?} tensor, got {got:?}")]
    DtypeMismatch { expected: Dtype, got: Dtype },

    #[error("invalid tensor: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
