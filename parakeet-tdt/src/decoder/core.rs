//! The greedy TDT decode loop itself.
//!
//! Grounded in `greedy_decode`'s label-looping while-loop (predictor/joint
//! calls gated by `max_symbols_per_step`, frame slicing via
//! `encoder_output.slice_axis`), generalized here to a separate predictor and
//! joint adapter, a cached `predictor_output` that survives across calls for
//! streaming continuation, and the inner blank fast-skip loop that reuses
//! that cache instead of re-running the predictor on every blank.

use crate::error::{Error, Result};
use crate::state::{DecoderConfig, PredictorState};
use crate::types::{EncoderFrames, Hypothesis};
use ndarray::ArrayView1;
use parakeet_model::{require, Inputs, ModelAdapter, Outputs};
use parakeet_tensor::{argmax, Tensor};
use std::collections::HashMap;
use tracing::{debug, trace};

const TARGETS_KEY: &str = "targets";
const TARGET_LENGTHS_KEY: &str = "target_lengths";
const H_IN_KEY: &str = "h_in";
const C_IN_KEY: &str = "c_in";
const DECODER_OUTPUT_KEY: &str = "decoder_output";
const H_OUT_KEY: &str = "h_out";
const C_OUT_KEY: &str = "c_out";
const ENCODER_OUTPUTS_KEY: &str = "encoder_outputs";
const DECODER_OUTPUTS_KEY: &str = "decoder_outputs";
const LOGITS_KEY: &str = "logits";

/// Run the predictor on `token`, threading `state.h`/`state.c` through the
/// call and overwriting them with the returned `(h_out, c_out)`.
///
/// Returns the predictor's `decoder_output` projection; does not touch
/// `state.predictor_output` or `state.last_token` — callers own that.
fn run_predictor(
    predictor: &mut dyn ModelAdapter,
    token: i32,
    state: &mut PredictorState,
) -> Result<Tensor> {
    let mut inputs: Inputs = HashMap::with_capacity(4);
    inputs.insert(TARGETS_KEY.to_string(), Tensor::i32(&[1, 1], vec![token])?);
    inputs.insert(TARGET_LENGTHS_KEY.to_string(), Tensor::i32(&[1], vec![1])?);
    inputs.insert(H_IN_KEY.to_string(), state.h.clone());
    inputs.insert(C_IN_KEY.to_string(), state.c.clone());

    let outputs: Outputs = predictor.predict(inputs).map_err(Error::from)?;
    let decoder_output = require(&outputs, DECODER_OUTPUT_KEY).map_err(Error::from)?.clone();
    state.h = require(&outputs, H_OUT_KEY).map_err(Error::from)?.clone();
    state.c = require(&outputs, C_OUT_KEY).map_err(Error::from)?.clone();

    trace!(token, "ran predictor");
    Ok(decoder_output)
}

/// Run the joint network on one encoder frame and the cached predictor
/// projection, returning the flat `logits` vector.
fn run_joint(
    joint: &mut dyn ModelAdapter,
    frame: ArrayView1<'_, f32>,
    predictor_output: &Tensor,
) -> Result<Vec<f32>> {
    let hidden = frame.len();
    let encoder_tensor = Tensor::f32(&[1, 1, hidden], frame.to_vec())?;

    let mut inputs: Inputs = HashMap::with_capacity(2);
    inputs.insert(ENCODER_OUTPUTS_KEY.to_string(), encoder_tensor);
    inputs.insert(DECODER_OUTPUTS_KEY.to_string(), predictor_output.clone());

    let outputs: Outputs = joint.predict(inputs).map_err(Error::from)?;
    let logits = require(&outputs, LOGITS_KEY).map_err(Error::from)?;
    let view = logits.as_f32().map_err(Error::from)?;
    Ok(view.iter().copied().collect())
}

/// One joint evaluation's decoded (label, score, duration).
struct JointStep {
    label: i32,
    score: f32,
    duration: i32,
}

/// Evaluate the joint network at `frame` and decode a label/score/duration,
/// applying the blank duration-zero guard.
fn joint_step(
    joint: &mut dyn ModelAdapter,
    frame: ArrayView1<'_, f32>,
    predictor_output: &Tensor,
    config: &DecoderConfig,
) -> Result<JointStep> {
    let logits = run_joint(joint, frame, predictor_output)?;
    let vocab_size = (config.blank_id + 1) as usize;
    if logits.len() < vocab_size + config.duration_bins.len() {
        return Err(Error::MissingFeature(format!(
            "joint logits length {} shorter than vocab {} + duration bins {}",
            logits.len(),
            vocab_size,
            config.duration_bins.len()
        )));
    }
    let token_logits = &logits[..vocab_size];
    let duration_logits = &logits[vocab_size..vocab_size + config.duration_bins.len()];

    let label = argmax(token_logits) as i32;
    let score = token_logits[label as usize];
    let d_idx = argmax(duration_logits);
    let mut duration = config.duration_bins[d_idx];

    if label == config.blank_id && duration == 0 {
        duration = 1;
    }

    Ok(JointStep { label, score, duration })
}

/// Decode as many (token, timestamp) pairs as the encoder frames support,
/// starting from `start_frame_offset` and threading `state` across calls.
///
/// # Errors
/// [`Error::InvalidShape`] if `encoder`'s rank is below 3; propagates model
/// adapter failures; [`Error::MissingFeature`] if the predictor or joint
/// output lacks a named tensor.
pub fn decode_with_timings(
    encoder: &Tensor,
    t_valid: usize,
    predictor: &mut dyn ModelAdapter,
    joint: &mut dyn ModelAdapter,
    state: &mut PredictorState,
    config: &DecoderConfig,
    start_frame_offset: i32,
    is_last_chunk: bool,
) -> Result<Hypothesis> {
    let frames = EncoderFrames::from_tensor(encoder)?;
    let mut hyp = Hypothesis::new(config.include_token_duration, state.clone());

    // Step 1: one-time priming of the autoregressive predictor.
    if state.last_token.is_none() && state.predictor_output.is_none() {
        let primed = run_predictor(predictor, config.blank_id, state)?;
        state.predictor_output = Some(primed);
        debug!("primed predictor with start-of-sequence blank");
    }

    // Step 2: time initialization.
    let mut t: i32 = match state.time_jump {
        Some(jump) => (jump + start_frame_offset).max(0),
        None => start_frame_offset,
    };
    if t as usize >= t_valid || t_valid == 0 {
        hyp.pred_state = state.clone();
        return Ok(hyp);
    }

    let mut emissions_at_t: u32 = 0;
    let mut last_emit_t: Option<i32> = None;

    // Upper bound on total joint evaluations (outer + inner fast-skip),
    // matching the loop-termination invariant. Force-advance alone can't
    // move `t` past `T_valid - 1` once pinned at the last frame, so this
    // counter is what actually guarantees the outer loop exits rather than
    // spinning on a model that keeps emitting non-blank tokens there.
    let max_joint_evaluations = t_valid.saturating_mul(config.max_symbols_per_step as usize + 1);
    let mut joint_evaluations: usize = 0;

    // Step 3: outer loop.
    while (t as usize) < t_valid && joint_evaluations < max_joint_evaluations {
        let predictor_output = match &state.predictor_output {
            Some(output) => output.clone(),
            None => run_predictor(predictor, state.last_token.unwrap_or(config.blank_id), state)?,
        };
        state.predictor_output = Some(predictor_output.clone());

        let frame_idx = (t as usize).min(t_valid - 1);
        let mut step = joint_step(joint, frames.frame(frame_idx), &predictor_output, config)?;
        joint_evaluations += 1;
        let mut t_emit = t;
        t += step.duration;

        // Step 3.h: inner blank fast-skip, predictor output held constant.
        while (t as usize) < t_valid && step.label == config.blank_id && joint_evaluations < max_joint_evaluations {
            let idx = (t as usize).min(t_valid - 1);
            step = joint_step(joint, frames.frame(idx), &predictor_output, config)?;
            joint_evaluations += 1;
            t_emit = t;
            t += step.duration;
        }

        trace!(t = t_emit, label = step.label, duration = step.duration, "decoded step");

        // Step 3.i: emission.
        if (t as usize) < t_valid && step.label != config.blank_id {
            if t_emit >= start_frame_offset {
                hyp.push(step.label, t_emit, step.duration, step.score);
            }

            let decoder_output = run_predictor(predictor, step.label, state)?;
            state.predictor_output = Some(decoder_output);
            state.last_token = Some(step.label);

            if last_emit_t == Some(t_emit) {
                emissions_at_t += 1;
            } else {
                emissions_at_t = 1;
                last_emit_t = Some(t_emit);
            }

            if emissions_at_t >= config.max_symbols_per_step {
                t = (t + 1).min(t_valid as i32 - 1);
                emissions_at_t = 0;
            }
        }
    }

    // Step 4: last-chunk drain.
    if is_last_chunk {
        let final_idx = t_valid.saturating_sub(1);
        let mut consecutive_blanks = 0u32;
        for _ in 0..config.max_symbols_per_step {
            let predictor_output = match &state.predictor_output {
                Some(output) => output.clone(),
                None => run_predictor(predictor, state.last_token.unwrap_or(config.blank_id), state)?,
            };
            state.predictor_output = Some(predictor_output.clone());

            let step = joint_step(joint, frames.frame(final_idx), &predictor_output, config)?;
            if step.label == config.blank_id {
                consecutive_blanks += 1;
                if consecutive_blanks >= 2 {
                    break;
                }
                continue;
            }
            consecutive_blanks = 0;

            hyp.push(step.label, final_idx as i32, step.duration, step.score);
            let decoder_output = run_predictor(predictor, step.label, state)?;
            state.predictor_output = Some(decoder_output);
            state.last_token = Some(step.label);
        }
        debug!(drained = hyp.y_sequence.len(), "last-chunk drain complete");
    }

    // Step 5: persist streaming state.
    state.last_token = hyp.last_token;
    if let Some(last) = state.last_token {
        if config.is_punctuation(last) {
            state.predictor_output = None;
        }
    }
    if !is_last_chunk {
        state.time_jump = Some(t - t_valid as i32);
    } else {
        state.time_jump = None;
    }
    hyp.pred_state = state.clone();

    Ok(hyp)
}
