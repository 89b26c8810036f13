//! Uniform `predict(inputs) -> outputs` contract for the six networks the
//! ASR and diarization pipelines drive (mel, encoder, predictor, joint,
//! segmentation, embedding).
//!
//! The networks themselves — model file download, on-disk cache layout,
//! compilation/loading, and the runtime that executes them (ONNX Runtime or
//! otherwise) — are out of scope for this workspace. This crate only
//! defines the seam: a trait any runtime-backed adapter implements, and
//! named input/output keys per network so callers and implementations
//! agree on what goes in and what comes out.

mod error;
mod network;

pub use error::{Error, Result};
pub use network::Network;

use parakeet_tensor::Tensor;
use std::collections::HashMap;

/// Named tensor inputs to a `predict` call.
pub type Inputs = HashMap<String, Tensor>;

/// Named tensor outputs from a `predict` call.
pub type Outputs = HashMap<String, Tensor>;

/// A model adapter uniformly wraps one network behind `predict`.
///
/// Implementations may serialize internally — must be safe to invoke from
/// any thread but are free to lock internally — so the trait takes
/// `&mut self` rather than requiring interior mutability from every
/// implementor; callers that need to share one adapter across threads
/// wrap it in a mutex themselves.
pub trait ModelAdapter {
    /// Run inference, consuming `inputs` and returning the network's named
    /// outputs.
    ///
    /// # Errors
    /// Implementations surface their own failures unchanged, typically via
    /// [`Error::ModelUnavailable`] or [`Error::Failed`].
    fn predict(&mut self, inputs: Inputs) -> Result<Outputs>;
}

/// Look up a named output tensor, or fail with [`Error::MissingOutput`].
///
/// The decoder and diarization pipeline build their own `MissingFeature`
/// errors on top of this when a predictor or joint output lacks a named
/// tensor.
pub fn require<'a>(outputs: &'a Outputs, name: &str) -> Result<&'a Tensor> {
    outputs
        .get(name)
        .ok_or_else(|| Error::MissingOutput(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoAdapter;

    impl ModelAdapter for EchoAdapter {
        fn predict(&mut self, inputs: Inputs) -> Result<Outputs> {
            Ok(inputs)
        }
    }

    #[test]
    fn require_finds_present_key() {
        let mut outputs = Outputs::new();
        outputs.insert("logits".to_string(), Tensor::zeros_f32(&[4]));
        assert!(require(&outputs, "logits").is_ok());
    }

    #[test]
    fn require_reports_missing_key() {
        let outputs = Outputs::new();
        let err = require(&outputs, "logits").unwrap_err();
        assert!(matches!(err, Error::MissingOutput(name) if name == "logits"));
    }

    #[test]
    fn adapter_roundtrips_through_predict() {
        let mut adapter = EchoAdapter;
        let mut inputs = Inputs::new();
        inputs.insert("x".to_string(), Tensor::zeros_f32(&[1]));
        let outputs = adapter.predict(inputs).unwrap();
        assert!(outputs.contains_key("x"));
    }
}
