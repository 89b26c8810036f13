//! Streaming greedy decoder and chunk orchestrator for Token-and-Duration
//! Transducer ASR: windows raw audio, runs the mel/encoder/predictor/joint
//! adapters, and decodes each window into timestamped tokens.

mod chunk;
mod decoder;
mod error;
mod merge;
mod state;
mod types;
mod vocab;

pub use chunk::{transcribe, ChunkGeometry, Models, FRAMES_PER_SECOND, SAMPLE_RATE};
pub use decoder::decode_with_timings;
pub use error::{Error, Result};
pub use merge::{merge_tokens, MergePolicy};
pub use state::{DecoderConfig, PredictorState};
pub use types::{EncoderFrames, Hypothesis, TimedToken, TranscriptionResult};
pub use vocab::Vocabulary;
