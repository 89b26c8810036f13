//! Data model for the diarization pipeline.

use crate::error::{Error, Result};
use std::collections::VecDeque;

/// FIFO cap on raw embeddings kept per centroid.
pub const RAW_EMBEDDINGS_CAPACITY: usize = 50;

/// Minimum L2 norm for an embedding to be considered valid; embeddings
/// must also have every component finite.
pub const MIN_EMBEDDING_MAGNITUDE: f32 = 0.1;

/// An online speaker identity: a running mean of its recent embeddings.
///
/// Invariant: `current_embedding` equals the arithmetic mean of
/// `raw_embeddings` whenever the centroid has been recalculated; its
/// magnitude is always > [`MIN_EMBEDDING_MAGNITUDE`] (an invalid mean is
/// never written back).
#[derive(Clone, Debug)]
pub struct SpeakerCentroid {
    pub id: String,
    pub current_embedding: Vec<f32>,
    pub raw_embeddings: VecDeque<Vec<f32>>,
    pub duration: f32,
    pub update_count: u32,
    pub created_at: f64,
    pub updated_at: f64,
}

impl SpeakerCentroid {
    pub fn new(id: String, embedding: Vec<f32>, duration: f32, now: f64) -> Self {
        let mut raw_embeddings = VecDeque::with_capacity(RAW_EMBEDDINGS_CAPACITY);
        raw_embeddings.push_back(embedding.clone());
        Self {
            id,
            current_embedding: embedding,
            raw_embeddings,
            duration,
            update_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dim(&self) -> usize {
        self.current_embedding.len()
    }
}

/// A single speaker-attributed time span.
///
/// Invariant: `end_s > start_s`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeakerSegment {
    pub speaker_id: String,
    pub start_s: f32,
    pub end_s: f32,
    pub confidence: f32,
}

impl SpeakerSegment {
    /// # Errors
    /// [`Error::InvalidShape`] if `end_s <= start_s`.
    pub fn new(speaker_id: String, start_s: f32, end_s: f32, confidence: f32) -> Result<Self> {
        if end_s <= start_s {
            return Err(Error::InvalidShape(format!(
                "segment end_s {end_s} must be greater than start_s {start_s}"
            )));
        }
        Ok(Self { speaker_id, start_s, end_s, confidence })
    }

    pub fn duration(&self) -> f32 {
        self.end_s - self.start_s
    }
}

/// Online clustering configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClusteringConfig {
    pub clustering_threshold: f32,
    pub min_speech_duration_s: f32,
    pub min_silence_gap_s: f32,
    /// `-1` means auto-detect the number of speakers.
    pub num_clusters: i32,
    pub min_active_frames: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clustering_threshold: 0.7,
            min_speech_duration_s: 1.0,
            min_silence_gap_s: 0.5,
            num_clusters: -1,
            min_active_frames: 10.0,
        }
    }
}

impl ClusteringConfig {
    /// # Errors
    /// [`Error::InvalidShape`] if `clustering_threshold` is outside `[0, 1]`
    /// or any other field is out of its documented range.
    pub fn validate(self) -> Result<Self> {
        if !(0.0..=1.0).contains(&self.clustering_threshold) {
            return Err(Error::InvalidShape(format!(
                "clustering_threshold {} outside [0, 1]",
                self.clustering_threshold
            )));
        }
        if self.min_speech_duration_s < 0.0 || self.min_silence_gap_s < 0.0 {
            return Err(Error::InvalidShape(
                "min_speech_duration_s and min_silence_gap_s must be non-negative".to_string(),
            ));
        }
        if self.min_active_frames < 0.0 {
            return Err(Error::InvalidShape("min_active_frames must be non-negative".to_string()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_centroid_seeds_raw_and_current() {
        let centroid = SpeakerCentroid::new("Speaker 1".to_string(), vec![1.0, 0.0], 2.0, 100.0);
        assert_eq!(centroid.raw_embeddings.len(), 1);
        assert_eq!(centroid.current_embedding, vec![1.0, 0.0]);
        assert_eq!(centroid.update_count, 1);
    }

    #[test]
    fn segment_rejects_non_positive_duration() {
        assert!(SpeakerSegment::new("a".to_string(), 1.0, 1.0, 0.5).is_err());
        assert!(SpeakerSegment::new("a".to_string(), 2.0, 1.0, 0.5).is_err());
    }

    #[test]
    fn default_config_has_documented_defaults() {
        let config = ClusteringConfig::default();
        assert_eq!(config.clustering_threshold, 0.7);
        assert_eq!(config.min_speech_duration_s, 1.0);
        assert_eq!(config.min_silence_gap_s, 0.5);
        assert_eq!(config.num_clusters, -1);
        assert_eq!(config.min_active_frames, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut config = ClusteringConfig::default();
        config.clustering_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_unknown_json_fields() {
        let json = r#"{"clustering_threshold": 0.5, "bogus_option": true}"#;
        let result: std::result::Result<ClusteringConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn config_deserializes_partial_json_with_defaults() {
        let json = r#"{"clustering_threshold": 0.5}"#;
        let config: ClusteringConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.clustering_threshold, 0.5);
        assert_eq!(config.num_clusters, ClusteringConfig::default().num_clusters);
    }
}
