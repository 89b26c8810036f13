//! Ties windowed segmentation, masked embedding extraction and online
//! clustering into one `diarize` call.
//!
//! The segmentation and embedding networks both expect a fixed 10 s
//! window; diarization-level chunking (window/step below) layers a
//! 50%-overlap sliding scan on top, in the style of speech-segment
//! scanners elsewhere in the ecosystem.

use crate::cluster::{assign_or_create, Assignment};
use crate::embedding::{extract_channel_embeddings, WAVEFORM_SAMPLES};
use crate::error::{Error, Result};
use crate::powerset::{decode_powerset, speaker_runs, NUM_SPEAKERS};
use crate::types::{ClusteringConfig, SpeakerCentroid, SpeakerSegment};
use parakeet_model::{require, Inputs, ModelAdapter, Outputs};
use parakeet_tensor::Tensor;
use std::sync::RwLock;
use tracing::debug;

/// Window step as a fraction of [`WAVEFORM_SAMPLES`]. The centroid
/// database is the sole process-wide state here; this window/step choice
/// only affects how often it's consulted, not its contract.
const WINDOW_STEP_SAMPLES: usize = WAVEFORM_SAMPLES / 2;

/// The speaker centroid database, protected by a mutual-exclusion
/// discipline: updates are serialized, reads may run concurrently between
/// updates — modeled directly as a `RwLock`.
pub struct CentroidStore {
    centroids: RwLock<Vec<SpeakerCentroid>>,
}

impl CentroidStore {
    pub fn new() -> Self {
        Self { centroids: RwLock::new(Vec::new()) }
    }

    /// Offer one embedding to the store, assigning, creating or
    /// discarding per `config`.
    pub fn assign(
        &self,
        embedding: &[f32],
        segment_duration: f32,
        config: &ClusteringConfig,
        now: f64,
    ) -> Assignment {
        let mut guard = self.centroids.write().expect("centroid store lock poisoned");
        assign_or_create(&mut guard, embedding, segment_duration, config, now, |n| format!("Speaker {}", n + 1))
    }

    /// A read-only snapshot of the current centroids.
    pub fn snapshot(&self) -> Vec<SpeakerCentroid> {
        self.centroids.read().expect("centroid store lock poisoned").clone()
    }

    /// Merge `source_id` into `target_id`, removing `source_id`.
    ///
    /// # Errors
    /// [`Error::UnknownCentroid`] if either id isn't present.
    pub fn merge(&self, target_id: &str, source_id: &str) -> Result<()> {
        let mut guard = self.centroids.write().expect("centroid store lock poisoned");
        let source_index = guard
            .iter()
            .position(|c| c.id == source_id)
            .ok_or_else(|| Error::UnknownCentroid(source_id.to_string()))?;
        let source = guard.remove(source_index);
        let target = guard
            .iter_mut()
            .find(|c| c.id == target_id)
            .ok_or_else(|| Error::UnknownCentroid(target_id.to_string()))?;
        crate::cluster::merge_centroids(target, &source);
        Ok(())
    }

    /// Remove every centroid, resetting the store for an explicit
    /// teardown.
    pub fn reset(&self) {
        self.centroids.write().expect("centroid store lock poisoned").clear();
    }
}

impl Default for CentroidStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The two networks the diarization pipeline drives.
pub struct DiarizationModels<'a> {
    pub segmentation: &'a mut dyn ModelAdapter,
    pub embedding: &'a mut dyn ModelAdapter,
}

fn fit_window(samples: &[f32]) -> Vec<f32> {
    let mut out = samples.to_vec();
    out.resize(WAVEFORM_SAMPLES, 0.0);
    out.truncate(WAVEFORM_SAMPLES);
    out
}

fn run_segmentation(segmentation: &mut dyn ModelAdapter, window: &[f32]) -> Result<Tensor> {
    let mut inputs: Inputs = Inputs::new();
    inputs.insert("audio".to_string(), Tensor::f32(&[1, 1, WAVEFORM_SAMPLES], window.to_vec())?);
    let outputs: Outputs = segmentation.predict(inputs).map_err(Error::from)?;
    Ok(require(&outputs, "segments").map_err(Error::from)?.clone())
}

/// Merge same-speaker segments whose gap is within `min_silence_gap_s`,
/// produced by overlapping diarization windows.
fn merge_adjacent(mut segments: Vec<SpeakerSegment>, min_silence_gap_s: f32) -> Vec<SpeakerSegment> {
    segments.sort_by(|a, b| a.speaker_id.cmp(&b.speaker_id).then(a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal)));
    let mut merged: Vec<SpeakerSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(last) = merged.last_mut() {
            if last.speaker_id == segment.speaker_id && segment.start_s <= last.end_s + min_silence_gap_s {
                last.end_s = last.end_s.max(segment.end_s);
                last.confidence = last.confidence.max(segment.confidence);
                continue;
            }
        }
        merged.push(segment);
    }
    merged.sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

/// Diarize `samples` (16 kHz mono f32 PCM) into speaker segments, assigning
/// each detected speaker region to `store`'s online centroid set.
///
/// # Errors
/// [`Error::InvalidAudio`] if `samples` is empty. Propagates model-adapter
/// and shape errors otherwise.
pub fn diarize(
    samples: &[f32],
    models: &mut DiarizationModels<'_>,
    store: &CentroidStore,
    config: &ClusteringConfig,
    now: f64,
) -> Result<Vec<SpeakerSegment>> {
    if samples.is_empty() {
        return Err(Error::InvalidAudio("empty audio".to_string()));
    }

    let mut segments = Vec::new();
    let mut offset = 0usize;
    loop {
        let end = (offset + WAVEFORM_SAMPLES).min(samples.len());
        let window = fit_window(&samples[offset..end]);
        let chunk_offset_s = offset as f64 / 16_000.0;

        let segmentation = run_segmentation(models.segmentation, &window)?;
        let binarized = decode_powerset(&segmentation)?;
        let runs = speaker_runs(&binarized, chunk_offset_s)?;

        if !runs.is_empty() {
            let embeddings = extract_channel_embeddings(models.embedding, &window, &binarized, config.min_active_frames)?;
            for run in &runs {
                let duration = (run.end_s - run.start_s) as f32;
                let Some(embedding) = &embeddings[run.speaker] else {
                    debug!(speaker = run.speaker, "no valid embedding for run, dropping");
                    continue;
                };
                let assignment = store.assign(embedding, duration, config, now);
                let (speaker_id, confidence) = match assignment {
                    Assignment::Matched { centroid_id, distance } => (centroid_id, 1.0 - distance),
                    Assignment::Created { centroid_id } => (centroid_id, 1.0),
                    Assignment::Discarded => continue,
                };
                segments.push(SpeakerSegment::new(speaker_id, run.start_s as f32, run.end_s as f32, confidence)?);
            }
        }

        if end >= samples.len() {
            break;
        }
        offset += WINDOW_STEP_SAMPLES;
    }

    Ok(merge_adjacent(segments, config.min_silence_gap_s))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSegmentation {
        class_per_frame: usize,
        frames: usize,
    }

    impl ModelAdapter for FixedSegmentation {
        fn predict(&mut self, _inputs: Inputs) -> parakeet_model::Result<Outputs> {
            let mut data = vec![-1.0f32; self.frames * 7];
            for f in 0..self.frames {
                data[f * 7 + self.class_per_frame] = 10.0;
            }
            let mut out = Outputs::new();
            out.insert("segments".to_string(), Tensor::f32(&[1, self.frames, 7], data)?);
            Ok(out)
        }
    }

    struct FixedEmbedding {
        vector: Vec<f32>,
    }

    impl ModelAdapter for FixedEmbedding {
        fn predict(&mut self, _inputs: Inputs) -> parakeet_model::Result<Outputs> {
            let dim = self.vector.len();
            let data: Vec<f32> = (0..NUM_SPEAKERS).flat_map(|_| self.vector.clone()).collect();
            let mut out = Outputs::new();
            out.insert("embedding".to_string(), Tensor::f32(&[NUM_SPEAKERS, dim], data)?);
            Ok(out)
        }
    }

    #[test]
    fn diarize_rejects_empty_audio() {
        let mut segmentation = FixedSegmentation { class_per_frame: 0, frames: 4 };
        let mut embedding = FixedEmbedding { vector: vec![1.0, 0.0] };
        let mut models = DiarizationModels { segmentation: &mut segmentation, embedding: &mut embedding };
        let store = CentroidStore::new();
        let config = ClusteringConfig::default();
        let result = diarize(&[], &mut models, &store, &config, 0.0);
        assert!(result.is_err());
    }

    #[test]
    fn diarize_single_speaker_window_creates_one_centroid() {
        let mut segmentation = FixedSegmentation { class_per_frame: 1, frames: 589 };
        let mut embedding = FixedEmbedding { vector: vec![1.0, 0.0] };
        let mut models = DiarizationModels { segmentation: &mut segmentation, embedding: &mut embedding };
        let store = CentroidStore::new();
        let mut config = ClusteringConfig::default();
        config.min_speech_duration_s = 0.0;
        config.min_active_frames = 0.0;

        let samples = vec![0.1f32; WAVEFORM_SAMPLES];
        let result = diarize(&samples, &mut models, &store, &config, 0.0).unwrap();
        assert!(!result.is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn merge_adjacent_joins_close_same_speaker_segments() {
        let segments = vec![
            SpeakerSegment::new("a".to_string(), 0.0, 1.0, 1.0).unwrap(),
            SpeakerSegment::new("a".to_string(), 1.2, 2.0, 0.9).unwrap(),
            SpeakerSegment::new("b".to_string(), 1.3, 1.9, 0.8).unwrap(),
        ];
        let merged = merge_adjacent(segments, 0.5);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].speaker_id, "a");
        assert_eq!(merged[0].end_s, 2.0);
    }

    #[test]
    fn centroid_store_merge_combines_and_removes_source() {
        let store = CentroidStore::new();
        let config = ClusteringConfig::default();
        store.assign(&[1.0, 0.0], 2.0, &config, 0.0);
        store.assign(&[0.0, 1.0], 2.0, &config, 1.0);
        let ids: Vec<String> = store.snapshot().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        store.merge(&ids[0], &ids[1]).unwrap();
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn centroid_store_merge_rejects_unknown_id() {
        let store = CentroidStore::new();
        assert!(store.merge("Speaker 1", "Speaker 2").is_err());
    }
}
