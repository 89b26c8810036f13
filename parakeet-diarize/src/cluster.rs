//! Online speaker clustering by cosine distance against a bounded set of
//! centroids, each backed by a FIFO-capped buffer of its most recent
//! embeddings.

use crate::types::{ClusteringConfig, SpeakerCentroid, RAW_EMBEDDINGS_CAPACITY};
use parakeet_tensor::{cosine_distance, mean_vectors};

/// Outcome of offering one segment's embedding to the centroid set.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// Matched an existing centroid at `distance` below the threshold.
    Matched { centroid_id: String, distance: f32 },
    /// No centroid was close enough; a new one was created.
    Created { centroid_id: String },
    /// No centroid matched and the segment was too short to seed a new one.
    Discarded,
}

/// Find the nearest centroid to `embedding` by cosine distance.
///
/// Returns `None` if `centroids` is empty.
fn nearest(centroids: &[SpeakerCentroid], embedding: &[f32]) -> Option<(usize, f32)> {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_distance(embedding, &c.current_embedding)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Fold one segment's embedding into the centroid set.
///
/// If the nearest centroid's cosine distance is within
/// `config.clustering_threshold`, the embedding is pushed onto that
/// centroid's FIFO buffer (evicting the oldest if it would exceed
/// [`RAW_EMBEDDINGS_CAPACITY`]) and `current_embedding` is recomputed as
/// the buffer's mean. Otherwise, if `segment_duration` clears
/// `config.min_speech_duration_s`, a fresh centroid is created; shorter
/// segments are discarded rather than seeding spurious speakers.
///
/// `next_id` is called only when a new centroid is created, to name it.
pub fn assign_or_create(
    centroids: &mut Vec<SpeakerCentroid>,
    embedding: &[f32],
    segment_duration: f32,
    config: &ClusteringConfig,
    now: f64,
    next_id: impl FnOnce(usize) -> String,
) -> Assignment {
    if let Some((index, distance)) = nearest(centroids, embedding) {
        if distance <= config.clustering_threshold {
            let centroid = &mut centroids[index];
            centroid.raw_embeddings.push_back(embedding.to_vec());
            while centroid.raw_embeddings.len() > RAW_EMBEDDINGS_CAPACITY {
                centroid.raw_embeddings.pop_front();
            }
            let dim = centroid.dim();
            let pooled: Vec<Vec<f32>> = centroid.raw_embeddings.iter().cloned().collect();
            centroid.current_embedding = mean_vectors(&pooled, dim);
            centroid.duration += segment_duration;
            centroid.update_count += 1;
            centroid.updated_at = now;
            return Assignment::Matched { centroid_id: centroid.id.clone(), distance };
        }
    }

    if segment_duration < config.min_speech_duration_s {
        return Assignment::Discarded;
    }

    let id = next_id(centroids.len());
    centroids.push(SpeakerCentroid::new(id.clone(), embedding.to_vec(), segment_duration, now));
    Assignment::Created { centroid_id: id }
}

/// Merge `source` into `target`, keeping `target`'s id.
///
/// Concatenates both raw-embedding buffers (truncated to
/// [`RAW_EMBEDDINGS_CAPACITY`] most recent), sums durations and update
/// counts, and recomputes `current_embedding` as the merged buffer's mean.
pub fn merge_centroids(target: &mut SpeakerCentroid, source: &SpeakerCentroid) {
    for embedding in &source.raw_embeddings {
        target.raw_embeddings.push_back(embedding.clone());
    }
    while target.raw_embeddings.len() > RAW_EMBEDDINGS_CAPACITY {
        target.raw_embeddings.pop_front();
    }
    let dim = target.dim();
    let pooled: Vec<Vec<f32>> = target.raw_embeddings.iter().cloned().collect();
    target.current_embedding = mean_vectors(&pooled, dim);
    target.duration += source.duration;
    target.update_count += source.update_count;
    target.updated_at = target.updated_at.max(source.updated_at);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClusteringConfig {
        ClusteringConfig::default()
    }

    #[test]
    fn first_embedding_always_creates() {
        let mut centroids = Vec::new();
        let assignment = assign_or_create(&mut centroids, &[1.0, 0.0], 2.0, &config(), 0.0, |n| format!("Speaker {n}"));
        assert_eq!(assignment, Assignment::Created { centroid_id: "Speaker 0".to_string() });
        assert_eq!(centroids.len(), 1);
    }

    #[test]
    fn close_embedding_matches_existing_centroid() {
        let mut centroids = Vec::new();
        assign_or_create(&mut centroids, &[1.0, 0.0], 2.0, &config(), 0.0, |n| format!("Speaker {n}"));
        let assignment = assign_or_create(&mut centroids, &[0.99, 0.01], 1.0, &config(), 1.0, |n| format!("Speaker {n}"));
        assert!(matches!(assignment, Assignment::Matched { .. }));
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].update_count, 2);
    }

    #[test]
    fn distant_embedding_with_enough_duration_creates_new_centroid() {
        let mut centroids = Vec::new();
        assign_or_create(&mut centroids, &[1.0, 0.0], 2.0, &config(), 0.0, |n| format!("Speaker {n}"));
        let assignment = assign_or_create(&mut centroids, &[0.0, 1.0], 2.0, &config(), 1.0, |n| format!("Speaker {n}"));
        assert_eq!(assignment, Assignment::Created { centroid_id: "Speaker 1".to_string() });
        assert_eq!(centroids.len(), 2);
    }

    #[test]
    fn distant_short_embedding_is_discarded() {
        let mut centroids = Vec::new();
        assign_or_create(&mut centroids, &[1.0, 0.0], 2.0, &config(), 0.0, |n| format!("Speaker {n}"));
        let assignment = assign_or_create(&mut centroids, &[0.0, 1.0], 0.1, &config(), 1.0, |n| format!("Speaker {n}"));
        assert_eq!(assignment, Assignment::Discarded);
        assert_eq!(centroids.len(), 1);
    }

    #[test]
    fn raw_embeddings_respect_fifo_capacity() {
        let mut centroids = Vec::new();
        assign_or_create(&mut centroids, &[1.0, 0.0], 2.0, &config(), 0.0, |n| format!("Speaker {n}"));
        for i in 0..RAW_EMBEDDINGS_CAPACITY + 10 {
            assign_or_create(&mut centroids, &[1.0, 0.0], 1.0, &config(), i as f64, |n| format!("Speaker {n}"));
        }
        assert_eq!(centroids[0].raw_embeddings.len(), RAW_EMBEDDINGS_CAPACITY);
    }

    #[test]
    fn merge_centroids_sums_durations_and_counts() {
        let mut a = SpeakerCentroid::new("a".to_string(), vec![1.0, 0.0], 2.0, 0.0);
        let b = SpeakerCentroid::new("b".to_string(), vec![0.0, 1.0], 3.0, 1.0);
        merge_centroids(&mut a, &b);
        assert_eq!(a.duration, 5.0);
        assert_eq!(a.update_count, 2);
        assert_eq!(a.raw_embeddings.len(), 2);
    }
}
