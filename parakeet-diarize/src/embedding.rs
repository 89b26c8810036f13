//! Masked mean-pooled embedding extraction: builds a per-speaker mask from
//! binarized powerset activations, excluding overlapped frames, and runs
//! the embedding network over the windowed waveform under that mask.

use crate::error::{Error, Result};
use crate::powerset::NUM_SPEAKERS;
use crate::types::MIN_EMBEDDING_MAGNITUDE;
use parakeet_model::{require, Inputs, ModelAdapter, Outputs};
use parakeet_tensor::{l2_norm, Tensor};
use std::collections::HashMap;

/// Fixed waveform length the embedding network expects: `waveform[3,160000]`,
/// 10 s at 16 kHz.
pub const WAVEFORM_SAMPLES: usize = 160_000;

/// Pad or truncate `samples` to exactly [`WAVEFORM_SAMPLES`].
fn fit_waveform(samples: &[f32]) -> Vec<f32> {
    let mut out = samples.to_vec();
    out.resize(WAVEFORM_SAMPLES, 0.0);
    out.truncate(WAVEFORM_SAMPLES);
    out
}

/// Build the `[3, F]` mask tensor from a `[1, F, 3]` binarized tensor:
/// `mask[s][f] = binarized[0][f][s] * clean[f]`, where `clean[f]` excludes
/// frames with 2 or more simultaneously active speakers.
///
/// Returns the mask tensor plus each speaker channel's active-frame count.
fn build_masks(binarized: &Tensor) -> Result<(Tensor, [f32; NUM_SPEAKERS])> {
    let view = binarized.as_f32()?;
    let shape = view.shape();
    let frames = shape[1];

    let mut mask = vec![0.0f32; NUM_SPEAKERS * frames];
    let mut active_frames = [0.0f32; NUM_SPEAKERS];

    for f in 0..frames {
        let activations: [f32; NUM_SPEAKERS] = std::array::from_fn(|s| view[[0, f, s]]);
        let overlap_count: f32 = activations.iter().sum();
        let clean = if overlap_count < 2.0 { 1.0 } else { 0.0 };
        for s in 0..NUM_SPEAKERS {
            let value = activations[s] * clean;
            mask[s * frames + f] = value;
            active_frames[s] += value;
        }
    }

    let mask_tensor = Tensor::f32(&[NUM_SPEAKERS, frames], mask)?;
    Ok((mask_tensor, active_frames))
}

fn is_valid_embedding(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite()) && l2_norm(values) > MIN_EMBEDDING_MAGNITUDE
}

/// Run the embedding network on one window's waveform and binarized
/// powerset activations, returning one embedding per speaker channel.
///
/// A channel's entry is `None` if its active-frame count doesn't clear
/// `min_active_frames`, or its returned embedding fails validity
/// (magnitude ≤ 0.1 or any non-finite component).
///
/// # Errors
/// Propagates the embedding adapter's own failures.
pub fn extract_channel_embeddings(
    embedding_adapter: &mut dyn ModelAdapter,
    waveform: &[f32],
    binarized: &Tensor,
    min_active_frames: f32,
) -> Result<[Option<Vec<f32>>; NUM_SPEAKERS]> {
    let (mask, active_frames) = build_masks(binarized)?;
    let fitted = fit_waveform(waveform);
    let replicated: Vec<f32> = fitted.iter().cycle().take(fitted.len() * NUM_SPEAKERS).copied().collect();

    let mut inputs: Inputs = HashMap::with_capacity(2);
    inputs.insert("waveform".to_string(), Tensor::f32(&[NUM_SPEAKERS, WAVEFORM_SAMPLES], replicated)?);
    inputs.insert("mask".to_string(), mask);

    let outputs: Outputs = embedding_adapter.predict(inputs).map_err(Error::from)?;
    let embeddings = require(&outputs, "embedding").map_err(Error::from)?;
    let view = embeddings.as_f32().map_err(Error::from)?;
    let shape = view.shape();
    if shape.first() != Some(&NUM_SPEAKERS) {
        return Err(Error::InvalidShape(format!("expected {NUM_SPEAKERS} embeddings, got shape {shape:?}")));
    }
    let dim = shape[1];

    let mut result: [Option<Vec<f32>>; NUM_SPEAKERS] = Default::default();
    for s in 0..NUM_SPEAKERS {
        if active_frames[s] <= min_active_frames {
            continue;
        }
        let vector: Vec<f32> = (0..dim).map(|d| view[[s, d]]).collect();
        if is_valid_embedding(&vector) {
            result[s] = Some(vector);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binarized_tensor(frames: &[[f32; NUM_SPEAKERS]]) -> Tensor {
        let mut data = Vec::with_capacity(frames.len() * NUM_SPEAKERS);
        for frame in frames {
            data.extend_from_slice(frame);
        }
        Tensor::f32(&[1, frames.len(), NUM_SPEAKERS], data).unwrap()
    }

    #[test]
    fn fit_waveform_pads_short_audio() {
        let short = vec![0.5f32; 100];
        assert_eq!(fit_waveform(&short).len(), WAVEFORM_SAMPLES);
    }

    #[test]
    fn fit_waveform_truncates_long_audio() {
        let long = vec![0.5f32; WAVEFORM_SAMPLES * 2];
        assert_eq!(fit_waveform(&long).len(), WAVEFORM_SAMPLES);
    }

    #[test]
    fn build_masks_excludes_overlapped_frames() {
        let binarized = binarized_tensor(&[[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        let (_mask, active) = build_masks(&binarized).unwrap();
        assert_eq!(active, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn is_valid_embedding_rejects_low_magnitude_and_nan() {
        assert!(!is_valid_embedding(&[0.01, 0.01]));
        assert!(!is_valid_embedding(&[f32::NAN, 1.0]));
        assert!(is_valid_embedding(&[1.0, 1.0]));
    }

    struct EchoEmbedder;

    impl ModelAdapter for EchoEmbedder {
        fn predict(&mut self, _inputs: Inputs) -> parakeet_model::Result<Outputs> {
            let data: Vec<f32> = (0..NUM_SPEAKERS * 4).map(|i| i as f32 * 0.1).collect();
            let mut out = Outputs::new();
            out.insert("embedding".to_string(), Tensor::f32(&[NUM_SPEAKERS, 4], data)?);
            Ok(out)
        }
    }

    #[test]
    fn extract_channel_embeddings_skips_channels_below_active_threshold() {
        let binarized = binarized_tensor(&[[1.0, 0.0, 0.0]; 5]);
        let mut embedder = EchoEmbedder;
        let waveform = vec![0.1f32; 1000];
        let result = extract_channel_embeddings(&mut embedder, &waveform, &binarized, 10.0).unwrap();
        assert!(result[0].is_none());
        assert!(result[1].is_none());
    }

    #[test]
    fn extract_channel_embeddings_keeps_active_channel() {
        let binarized = binarized_tensor(&[[1.0, 0.0, 0.0]; 20]);
        let mut embedder = EchoEmbedder;
        let waveform = vec![0.1f32; 1000];
        let result = extract_channel_embeddings(&mut embedder, &waveform, &binarized, 10.0).unwrap();
        assert!(result[0].is_some());
    }
}
