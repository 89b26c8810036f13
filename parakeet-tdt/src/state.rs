//! Predictor state and decoder configuration.

use parakeet_tensor::Tensor;

/// LSTM layer count and hidden size for the predictor network.
///
/// Fixed by the model architecture — `PredictorState` tensors are always
/// shape `[2, 1, 640]` — not a tunable.
pub const PREDICTOR_LAYERS: usize = 2;
pub const PREDICTOR_BATCH: usize = 1;
pub const PREDICTOR_HIDDEN: usize = 640;

fn predictor_shape() -> [usize; 3] {
    [PREDICTOR_LAYERS, PREDICTOR_BATCH, PREDICTOR_HIDDEN]
}

/// Mutable cross-call decoder state for one streaming session.
///
/// Created zeroed at session start, mutated only by the decoder on
/// non-blank emission or explicit [`PredictorState::reset`], destroyed at
/// session end.
#[derive(Clone, Debug)]
pub struct PredictorState {
    pub h: Tensor,
    pub c: Tensor,
    /// Most recent emitted non-blank token, used to seed the next chunk's
    /// continuation.
    pub last_token: Option<i32>,
    /// Cached projection of the predictor given `last_token`; valid until
    /// the predictor state mutates again.
    pub predictor_output: Option<Tensor>,
    /// Leftover frames the decoder overran the previous chunk by; seeds
    /// the next chunk's starting time index. Only meaningful mid-stream:
    /// the last chunk resets it to `None` rather than carrying forward a
    /// stale value.
    pub time_jump: Option<i32>,
}

impl Default for PredictorState {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorState {
    /// A freshly zeroed state, as at session start.
    pub fn new() -> Self {
        let shape = predictor_shape();
        Self {
            h: Tensor::zeros_f32(&shape),
            c: Tensor::zeros_f32(&shape),
            last_token: None,
            predictor_output: None,
            time_jump: None,
        }
    }

    /// True once the predictor has been primed with a start-of-sequence
    /// projection.
    pub fn is_fresh(&self) -> bool {
        self.last_token.is_none() && self.predictor_output.is_none()
    }

    /// Reset every field to its session-start value.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Serialize to an opaque byte blob: the two state tensors plus
    /// `last_token` and `time_jump`. `predictor_output` is deliberately
    /// not persisted — it is a cache, not state, and is recomputed lazily
    /// on the next decode call.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * PREDICTOR_LAYERS * PREDICTOR_BATCH * PREDICTOR_HIDDEN * 4 + 10);
        write_f32_tensor(&mut out, &self.h);
        write_f32_tensor(&mut out, &self.c);
        write_option_i32(&mut out, self.last_token);
        write_option_i32(&mut out, self.time_jump);
        out
    }

    /// Deserialize a blob produced by [`PredictorState::to_bytes`].
    ///
    /// # Errors
    /// Returns `None` if `bytes` is truncated or malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let shape = predictor_shape();
        let tensor_len = PREDICTOR_LAYERS * PREDICTOR_BATCH * PREDICTOR_HIDDEN;
        let mut cursor = 0usize;

        let h = read_f32_tensor(bytes, &mut cursor, &shape, tensor_len)?;
        let c = read_f32_tensor(bytes, &mut cursor, &shape, tensor_len)?;
        let last_token = read_option_i32(bytes, &mut cursor)?;
        let time_jump = read_option_i32(bytes, &mut cursor)?;

        Some(Self {
            h,
            c,
            last_token,
            predictor_output: None,
            time_jump,
        })
    }
}

fn write_f32_tensor(out: &mut Vec<u8>, tensor: &Tensor) {
    let view = tensor.as_f32().expect("PredictorState tensors are always f32");
    for v in view.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn read_f32_tensor(bytes: &[u8], cursor: &mut usize, shape: &[usize], len: usize) -> Option<Tensor> {
    let needed = len * 4;
    let chunk = bytes.get(*cursor..*cursor + needed)?;
    *cursor += needed;
    let data: Vec<f32> = chunk
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Tensor::f32(shape, data).ok()
}

fn write_option_i32(out: &mut Vec<u8>, value: Option<i32>) {
    match value {
        Some(v) => {
            out.push(1);
            out.extend_from_slice(&v.to_le_bytes());
        }
        None => out.push(0),
    }
}

fn read_option_i32(bytes: &[u8], cursor: &mut usize) -> Option<Option<i32>> {
    let flag = *bytes.get(*cursor)?;
    *cursor += 1;
    match flag {
        0 => Some(None),
        1 => {
            let chunk = bytes.get(*cursor..*cursor + 4)?;
            *cursor += 4;
            Some(Some(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        }
        _ => None,
    }
}

/// Decoder configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DecoderConfig {
    pub include_token_duration: bool,
    pub max_symbols_per_step: u32,
    pub duration_bins: Vec<i32>,
    pub blank_id: i32,
    /// Token ids whose emission clears the predictor cache at a chunk
    /// boundary. A vocabulary-specific assumption, not a universal
    /// constant, so this is parametrized rather than hard-coded.
    pub punctuation_tokens: Vec<i32>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            include_token_duration: true,
            max_symbols_per_step: 10,
            duration_bins: vec![0, 1, 2, 3, 4],
            blank_id: 8192,
            punctuation_tokens: vec![7883, 7952, 7948],
        }
    }
}

impl DecoderConfig {
    pub fn is_punctuation(&self, token: i32) -> bool {
        self.punctuation_tokens.contains(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_fresh() {
        let state = PredictorState::new();
        assert!(state.is_fresh());
        assert_eq!(state.time_jump, None);
    }

    #[test]
    fn reset_clears_all_four_fields() {
        let mut state = PredictorState::new();
        state.last_token = Some(5);
        state.predictor_output = Some(Tensor::zeros_f32(&[1]));
        state.time_jump = Some(3);
        state.reset();
        assert!(state.is_fresh());
        assert_eq!(state.time_jump, None);
    }

    #[test]
    fn bytes_roundtrip_preserves_state() {
        let mut state = PredictorState::new();
        state.last_token = Some(42);
        state.time_jump = Some(-3);
        let shape = predictor_shape();
        state.h = Tensor::f32(&shape, vec![1.5; shape.iter().product()]).unwrap();

        let bytes = state.to_bytes();
        let restored = PredictorState::from_bytes(&bytes).unwrap();

        assert_eq!(restored.last_token, Some(42));
        assert_eq!(restored.time_jump, Some(-3));
        assert_eq!(restored.h.as_f32().unwrap(), state.h.as_f32().unwrap());
        // predictor_output is a cache, not persisted state.
        assert!(restored.predictor_output.is_none());
    }

    #[test]
    fn bytes_roundtrip_with_none_fields() {
        let state = PredictorState::new();
        let bytes = state.to_bytes();
        let restored = PredictorState::from_bytes(&bytes).unwrap();
        assert_eq!(restored.last_token, None);
        assert_eq!(restored.time_jump, None);
    }

    #[test]
    fn from_bytes_rejects_truncated_input() {
        assert!(PredictorState::from_bytes(&[1, 2, 3]).is_none());
    }

    #[test]
    fn default_config_has_documented_defaults() {
        let config = DecoderConfig::default();
        assert!(config.include_token_duration);
        assert_eq!(config.max_symbols_per_step, 10);
        assert_eq!(config.duration_bins, vec![0, 1, 2, 3, 4]);
        assert_eq!(config.blank_id, 8192);
        assert!(config.is_punctuation(7883));
        assert!(!config.is_punctuation(42));
    }

    #[test]
    fn config_rejects_unknown_json_fields() {
        let json = r#"{"max_symbols_per_step": 5, "bogus_option": true}"#;
        let result: std::result::Result<DecoderConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn config_deserializes_partial_json_with_defaults() {
        let json = r#"{"max_symbols_per_step": 5}"#;
        let config: DecoderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_symbols_per_step, 5);
        assert_eq!(config.blank_id, DecoderConfig::default().blank_id);
    }
}
