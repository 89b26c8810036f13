//! 7-class powerset activation decoding into 3 per-speaker channels.

use crate::error::Result;
use parakeet_tensor::{argmax, Tensor};

/// Frame duration and hop of the segmentation model's sliding window.
pub const FRAME_DURATION_S: f64 = 0.0619375;
pub const FRAME_STEP_S: f64 = 0.016875;

pub const NUM_SPEAKERS: usize = 3;
pub const NUM_POWERSET_CLASSES: usize = 7;

/// Speaker membership for each of the 7 powerset classes, in class-index
/// order: `{∅, {0}, {1}, {2}, {0,1}, {0,2}, {1,2}}`.
const POWERSET_CLASSES: [[bool; NUM_SPEAKERS]; NUM_POWERSET_CLASSES] = [
    [false, false, false],
    [true, false, false],
    [false, true, false],
    [false, false, true],
    [true, true, false],
    [true, false, true],
    [false, true, true],
];

/// Decode a segmentation tensor of shape `[B, F, 7]` into a binarized
/// tensor of shape `[B, F, 3]`: `binarized[b][f][s] = 1` iff speaker `s`
/// is in the argmax powerset class for frame `f`.
///
/// # Errors
/// [`crate::Error::InvalidShape`] if `segmentation`'s rank is not 3 or its
/// last dimension is not 7.
pub fn decode_powerset(segmentation: &Tensor) -> Result<Tensor> {
    segmentation.require_rank(3)?;
    let view = segmentation.as_f32()?;
    let shape = view.shape().to_vec();
    let classes = shape[shape.len() - 1];
    if classes != NUM_POWERSET_CLASSES {
        return Err(crate::Error::InvalidShape(format!(
            "expected {NUM_POWERSET_CLASSES} powerset classes, got {classes}"
        )));
    }
    let batch = shape[0];
    let frames = shape[1];

    let mut out = vec![0.0f32; batch * frames * NUM_SPEAKERS];
    for b in 0..batch {
        for f in 0..frames {
            let logits: Vec<f32> = (0..classes).map(|c| view[[b, f, c]]).collect();
            let class = argmax(&logits);
            let membership = POWERSET_CLASSES[class];
            for (s, &active) in membership.iter().enumerate() {
                out[(b * frames + f) * NUM_SPEAKERS + s] = if active { 1.0 } else { 0.0 };
            }
        }
    }

    Ok(Tensor::f32(&[batch, frames, NUM_SPEAKERS], out)?)
}

/// A contiguous run of frames where speaker `speaker` is the sole active
/// speaker, expressed in absolute stream time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeakerRun {
    pub speaker: usize,
    pub start_s: f64,
    pub end_s: f64,
}

/// Group a `[1, F, 3]` binarized tensor's frames into contiguous per-
/// speaker runs, using the fixed frame duration/step above.
///
/// Frames where more than one speaker is active (overlap) or none are
/// active (silence) break any run in progress for every speaker.
///
/// # Errors
/// [`crate::Error::InvalidShape`] if `binarized`'s batch dimension isn't 1.
pub fn speaker_runs(binarized: &Tensor, chunk_offset_s: f64) -> Result<Vec<SpeakerRun>> {
    let view = binarized.as_f32()?;
    let shape = view.shape();
    if shape[0] != 1 {
        return Err(crate::Error::InvalidShape("speaker_runs expects batch size 1".to_string()));
    }
    let frames = shape[1];

    let mut runs = Vec::new();
    let mut open: [Option<usize>; NUM_SPEAKERS] = [None; NUM_SPEAKERS];

    for f in 0..frames {
        let active: [bool; NUM_SPEAKERS] =
            std::array::from_fn(|s| view[[0, f, s]] > 0.0);
        let active_count = active.iter().filter(|&&a| a).count();

        for s in 0..NUM_SPEAKERS {
            let solo_active = active[s] && active_count == 1;
            match (open[s], solo_active) {
                (None, true) => open[s] = Some(f),
                (Some(start), false) => {
                    runs.push(frame_run_to_time(s, start, f, chunk_offset_s));
                    open[s] = None;
                }
                _ => {}
            }
        }
    }

    for s in 0..NUM_SPEAKERS {
        if let Some(start) = open[s] {
            runs.push(frame_run_to_time(s, start, frames, chunk_offset_s));
        }
    }

    runs.sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));
    Ok(runs)
}

fn frame_run_to_time(speaker: usize, start_frame: usize, end_frame_exclusive: usize, chunk_offset_s: f64) -> SpeakerRun {
    SpeakerRun {
        speaker,
        start_s: chunk_offset_s + start_frame as f64 * FRAME_STEP_S,
        end_s: chunk_offset_s + (end_frame_exclusive - 1) as f64 * FRAME_STEP_S + FRAME_DURATION_S,
    }
}
