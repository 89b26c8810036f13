//! Chunked streaming orchestrator: windows raw audio, drives the mel and
//! encoder adapters per window, decodes each window, and stitches the
//! per-window token streams into one transcript.
//!
//! Grounded in `melops-asr/src/chunk.rs`'s `ChunkConfig`/`ChunkRangeIter`
//! windowing iterator, generalized from a flat duration/overlap pair to the
//! asymmetric left/right-context geometry below.

use crate::decoder::decode_with_timings;
use crate::error::{Error, Result};
use crate::merge::{merge_tokens, MergePolicy};
use crate::state::{DecoderConfig, PredictorState};
use crate::types::{TimedToken, TranscriptionResult};
use crate::vocab::Vocabulary;
use parakeet_model::{require, Inputs, ModelAdapter, Outputs};
use parakeet_tensor::Tensor;
use std::collections::HashMap;
use tracing::debug;

pub const SAMPLE_RATE: usize = 16_000;
pub const FRAMES_PER_SECOND: f64 = 12.5;

const MIN_VALID_SAMPLES: usize = SAMPLE_RATE; // 1.0 s
const MIN_VALID_RMS: f32 = 0.01;

/// Window geometry for the chunk orchestrator.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChunkGeometry {
    pub center_s: f64,
    pub left_context_s: f64,
    pub right_context_s: f64,
    pub max_window_s: f64,
}

impl Default for ChunkGeometry {
    fn default() -> Self {
        Self {
            center_s: 11.0,
            left_context_s: 2.0,
            right_context_s: 2.0,
            max_window_s: 15.0,
        }
    }
}

impl ChunkGeometry {
    fn center_samples(&self) -> usize {
        (self.center_s * SAMPLE_RATE as f64).round() as usize
    }

    fn left_samples(&self) -> usize {
        (self.left_context_s * SAMPLE_RATE as f64).round() as usize
    }

    fn right_samples(&self) -> usize {
        (self.right_context_s * SAMPLE_RATE as f64).round() as usize
    }

    fn max_window_samples(&self) -> usize {
        (self.max_window_s * SAMPLE_RATE as f64).round() as usize
    }

    /// `start_frame_offset` for every chunk after the first:
    /// `round(left_context_s * 12.5)`.
    fn continuation_frame_offset(&self) -> i32 {
        (self.left_context_s * FRAMES_PER_SECOND).round() as i32
    }

    /// One window per center block, clipped to the sample range actually
    /// available.
    fn windows(&self, total_len: usize) -> Vec<ChunkWindow> {
        let center = self.center_samples().max(1);
        let left = self.left_samples();
        let right = self.right_samples();
        let max_window = self.max_window_samples();

        let mut windows = Vec::new();
        let mut center_start = 0usize;
        let mut index = 0usize;
        while center_start < total_len {
            let window_start = center_start.saturating_sub(left);
            let mut window_end = (center_start + center + right).min(total_len);
            if window_end - window_start > max_window {
                window_end = window_start + max_window;
            }
            let is_last = window_end >= total_len;
            windows.push(ChunkWindow {
                start: window_start,
                end: window_end,
                start_frame_offset: if index == 0 { 0 } else { self.continuation_frame_offset() },
                chunk_time_offset_s: window_start as f64 / SAMPLE_RATE as f64,
                is_last,
            });
            center_start += center;
            index += 1;
        }
        windows
    }
}

struct ChunkWindow {
    start: usize,
    end: usize,
    start_frame_offset: i32,
    chunk_time_offset_s: f64,
    is_last: bool,
}

/// Bundles the four model adapters the ASR data flow calls per chunk:
/// mel spectrogram, encoder, predictor, joint.
pub struct Models<'a> {
    pub mel: &'a mut dyn ModelAdapter,
    pub encoder: &'a mut dyn ModelAdapter,
    pub predictor: &'a mut dyn ModelAdapter,
    pub joint: &'a mut dyn ModelAdapter,
}

fn validate_audio(samples: &[f32]) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::InvalidAudio("audio is empty".to_string()));
    }
    if samples.len() < MIN_VALID_SAMPLES {
        return Err(Error::InvalidAudio(format!(
            "audio is {} samples, shorter than the 1.0 s minimum",
            samples.len()
        )));
    }
    let mean_sq = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = mean_sq.sqrt();
    if rms < MIN_VALID_RMS {
        return Err(Error::InvalidAudio(format!("audio RMS {rms} below silence threshold {MIN_VALID_RMS}")));
    }
    Ok(())
}

fn run_mel(mel: &mut dyn ModelAdapter, window: &[f32]) -> Result<(Tensor, i32)> {
    let mut inputs: Inputs = HashMap::with_capacity(2);
    inputs.insert("audio_signal".to_string(), Tensor::f32(&[1, window.len()], window.to_vec())?);
    inputs.insert("audio_length".to_string(), Tensor::i32(&[1], vec![window.len() as i32])?);

    let outputs: Outputs = mel.predict(inputs).map_err(Error::from)?;
    let spectrogram = require(&outputs, "melspectogram").map_err(Error::from)?.clone();
    let length = require(&outputs, "melspectogram_length").map_err(Error::from)?;
    let length_value = length.as_i32().map_err(Error::from)?.iter().next().copied().unwrap_or(0);
    Ok((spectrogram, length_value))
}

fn run_encoder(encoder: &mut dyn ModelAdapter, mel: Tensor, mel_length: i32) -> Result<(Tensor, usize)> {
    let mut inputs: Inputs = HashMap::with_capacity(2);
    inputs.insert("audio_signal".to_string(), mel);
    inputs.insert("length".to_string(), Tensor::i32(&[1], vec![mel_length])?);

    let outputs: Outputs = encoder.predict(inputs).map_err(Error::from)?;
    let encoded = require(&outputs, "encoder").map_err(Error::from)?.clone();
    let encoded_lengths = require(&outputs, "encoded_lengths").map_err(Error::from)?;
    let t_valid = encoded_lengths
        .as_i32()
        .map_err(Error::from)?
        .iter()
        .next()
        .copied()
        .unwrap_or(0)
        .max(0) as usize;
    Ok((encoded, t_valid))
}

fn frame_duration_s() -> f64 {
    1.0 / FRAMES_PER_SECOND
}

/// Convert a chunk's decoded hypothesis into timestamped tokens in absolute
/// stream time.
fn to_timed_tokens(
    tokens: &[i32],
    timestamps: &[i32],
    durations: Option<&[i32]>,
    chunk_time_offset_s: f64,
) -> Vec<TimedToken> {
    tokens
        .iter()
        .zip(timestamps.iter())
        .enumerate()
        .map(|(i, (&id, &ts))| {
            let duration_frames = durations.and_then(|d| d.get(i)).copied().unwrap_or(1);
            TimedToken {
                id,
                start: chunk_time_offset_s + ts as f64 * frame_duration_s(),
                duration: duration_frames as f64 * frame_duration_s(),
            }
        })
        .collect()
}

/// Segment `samples` into overlapping windows, decode each with the given
/// models, and stitch the per-window token streams into one transcript.
///
/// # Errors
/// [`Error::InvalidAudio`] if `samples` is empty, shorter than 1.0 s, or
/// silent (RMS below 0.01); propagates model and decoder failures.
pub fn transcribe(
    samples: &[f32],
    models: &mut Models<'_>,
    state: &mut PredictorState,
    config: &DecoderConfig,
    vocabulary: &Vocabulary,
    geometry: &ChunkGeometry,
) -> Result<TranscriptionResult> {
    let started = std::time::Instant::now();
    validate_audio(samples)?;

    let windows = geometry.windows(samples.len());
    let mut running: Vec<TimedToken> = Vec::new();

    for window in &windows {
        let slice = &samples[window.start..window.end];
        let (mel, mel_length) = run_mel(models.mel, slice)?;
        let (encoder_output, t_valid) = run_encoder(models.encoder, mel, mel_length)?;

        let hyp = decode_with_timings(
            &encoder_output,
            t_valid,
            models.predictor,
            models.joint,
            state,
            config,
            window.start_frame_offset,
            window.is_last,
        )?;

        let durations = hyp.token_durations.as_deref();
        let timed = to_timed_tokens(&hyp.y_sequence, &hyp.timestamps, durations, window.chunk_time_offset_s);

        debug!(emitted = timed.len(), start_s = window.chunk_time_offset_s, "decoded chunk");
        running = merge_tokens(&running, &timed, MergePolicy::default(), config);
    }

    let tokens: Vec<i32> = running.iter().map(|t| t.id).collect();
    let timestamps_frames: Vec<i32> = running
        .iter()
        .map(|t| (t.start * FRAMES_PER_SECOND).round() as i32)
        .collect();
    let token_durations_frames: Vec<i32> = running
        .iter()
        .map(|t| (t.duration * FRAMES_PER_SECOND).round() as i32)
        .collect();

    let text = vocabulary.detokenize(&tokens);
    let confidence = if tokens.is_empty() { 0.0 } else { 1.0 };

    Ok(TranscriptionResult {
        text,
        tokens,
        timestamps_frames,
        token_durations_frames,
        confidence,
        duration_s: samples.len() as f64 / SAMPLE_RATE as f64,
        processing_time_s: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_audio() {
        assert!(validate_audio(&[]).is_err());
    }

    #[test]
    fn rejects_short_audio() {
        let samples = vec![0.5f32; SAMPLE_RATE / 2];
        assert!(validate_audio(&samples).is_err());
    }

    #[test]
    fn rejects_silent_audio() {
        let samples = vec![0.0f32; SAMPLE_RATE * 2];
        assert!(validate_audio(&samples).is_err());
    }

    #[test]
    fn geometry_rejects_unknown_json_fields() {
        let json = r#"{"center_s": 11.0, "bogus_option": true}"#;
        let result: std::result::Result<ChunkGeometry, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_valid_audio() {
        let samples: Vec<f32> = (0..SAMPLE_RATE * 2).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        assert!(validate_audio(&samples).is_ok());
    }

    #[test]
    fn single_window_covers_short_audio() {
        let geometry = ChunkGeometry::default();
        let windows = geometry.windows(SAMPLE_RATE * 3);
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_last);
        assert_eq!(windows[0].start_frame_offset, 0);
    }

    #[test]
    fn second_window_uses_continuation_offset() {
        let geometry = ChunkGeometry::default();
        let windows = geometry.windows(geometry.center_samples() * 3);
        assert!(windows.len() >= 2);
        assert_eq!(windows[1].start_frame_offset, 25);
    }

    #[test]
    fn windows_never_exceed_max_window_samples() {
        let geometry = ChunkGeometry::default();
        let windows = geometry.windows(geometry.center_samples() * 5);
        for w in &windows {
            assert!(w.end - w.start <= geometry.max_window_samples());
        }
    }
}
