//! Powerset-decoding speaker diarization: segmentation → binarization →
//! masked embedding → online clustering → timed speaker segments.

mod cluster;
mod embedding;
mod error;
mod pipeline;
mod powerset;
mod types;

pub use cluster::{assign_or_create, merge_centroids, Assignment};
pub use embedding::{extract_channel_embeddings, WAVEFORM_SAMPLES};
pub use error::{Error, Result};
pub use pipeline::{diarize, CentroidStore, DiarizationModels};
pub use powerset::{decode_powerset, speaker_runs, SpeakerRun, FRAME_DURATION_S, FRAME_STEP_S, NUM_POWERSET_CLASSES, NUM_SPEAKERS};
pub use types::{ClusteringConfig, SpeakerCentroid, SpeakerSegment, MIN_EMBEDDING_MAGNITUDE, RAW_EMBEDDINGS_CAPACITY};
