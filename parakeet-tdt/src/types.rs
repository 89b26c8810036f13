//! Hypothesis, encoder frame view, and the pipeline's external result
//! types.

use crate::error::{Error, Result};
use crate::state::PredictorState;
use ndarray::{ArrayView1, ArrayViewD};
use parakeet_tensor::Tensor;

/// Growable record of a greedy transduction in progress.
///
/// Invariant: `y_sequence.len() == timestamps.len()`, and
/// `== token_durations.len()` whenever durations are tracked.
#[derive(Clone, Debug)]
pub struct Hypothesis {
    pub y_sequence: Vec<i32>,
    pub timestamps: Vec<i32>,
    pub token_durations: Option<Vec<i32>>,
    pub score: f32,
    pub last_token: Option<i32>,
    pub pred_state: PredictorState,
}

impl Hypothesis {
    pub fn new(include_token_duration: bool, pred_state: PredictorState) -> Self {
        Self {
            y_sequence: Vec::new(),
            timestamps: Vec::new(),
            token_durations: include_token_duration.then(Vec::new),
            score: 0.0,
            last_token: None,
            pred_state,
        }
    }

    /// Append one emitted (token, timestamp, duration) triple and
    /// accumulate its score, maintaining the hypothesis invariant.
    pub fn push(&mut self, token: i32, timestamp: i32, duration: i32, token_score: f32) {
        self.y_sequence.push(token);
        self.timestamps.push(timestamp);
        if let Some(durations) = &mut self.token_durations {
            durations.push(duration);
        }
        self.score += token_score;
        self.last_token = Some(token);
    }

    pub fn is_empty(&self) -> bool {
        self.y_sequence.is_empty()
    }

    /// Check the length invariants hold; used by tests and debug assertions.
    pub fn check_invariants(&self) -> bool {
        let n = self.y_sequence.len();
        if self.timestamps.len() != n {
            return false;
        }
        if let Some(durations) = &self.token_durations {
            if durations.len() != n {
                return false;
            }
        }
        self.timestamps.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Lazy, zero-copy view over one chunk's encoder output, shape `[1, T, H]`.
pub struct EncoderFrames<'a> {
    view: ArrayViewD<'a, f32>,
}

impl<'a> EncoderFrames<'a> {
    /// # Errors
    /// [`Error::InvalidShape`] if `tensor` has rank < 3.
    pub fn from_tensor(tensor: &'a Tensor) -> Result<Self> {
        tensor.require_rank(3)?;
        let view = tensor
            .as_f32()
            .map_err(|e| Error::InvalidShape(e.to_string()))?;
        Ok(Self { view })
    }

    pub fn hidden_size(&self) -> usize {
        *self.view.shape().last().unwrap_or(&0)
    }

    pub fn t_total(&self) -> usize {
        self.view.shape()[self.view.ndim() - 2]
    }

    /// Borrow frame `t` (batch index 0) as a 1-D view, with no copy.
    ///
    /// # Panics
    /// If `t >= self.t_total()`. Callers clamp `t` to `t_valid - 1` before
    /// calling.
    pub fn frame(&self, t: usize) -> ArrayView1<'_, f32> {
        self.view
            .index_axis(ndarray::Axis(0), 0)
            .index_axis(ndarray::Axis(0), t)
            .into_dimensionality()
            .expect("frame is always 1-D after indexing batch and time axes")
    }
}

/// A single decoded token with timing, as kept for cross-chunk merge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedToken {
    pub id: i32,
    pub start: f64,
    pub duration: f64,
}

/// Final transcription returned to the caller.
#[derive(Clone, Debug, Default)]
pub struct TranscriptionResult {
    pub text: String,
    pub tokens: Vec<i32>,
    pub timestamps_frames: Vec<i32>,
    pub token_durations_frames: Vec<i32>,
    pub confidence: f32,
    pub duration_s: f64,
    pub processing_time_s: f64,
}
