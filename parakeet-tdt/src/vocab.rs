//! Token vocabulary: id-to-string lookup and detokenization.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// SentencePiece-style word-boundary marker. A leading `▁` on a piece means
/// "start a new word here"; it is rendered as a space, never as itself.
const WORD_BOUNDARY: char = '\u{2581}';

/// Id-to-string token map loaded from the model's vocabulary file.
///
/// Entries with an empty string value are dropped at load time: they carry
/// no text and would otherwise insert nothing while still occupying a slot
/// in the vector that `detokenize` iterates.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    tokens: HashMap<i32, String>,
}

impl Vocabulary {
    /// Build a vocabulary directly from an id-to-piece map, filtering out
    /// empty-string entries.
    pub fn from_map(map: HashMap<i32, String>) -> Self {
        let tokens = map.into_iter().filter(|(_, piece)| !piece.is_empty()).collect();
        Self { tokens }
    }

    /// Load a `{"0": "piece", ...}`-shaped JSON vocabulary file.
    ///
    /// # Errors
    /// [`Error::ProcessingFailed`] if the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ProcessingFailed(format!("reading vocabulary {path:?}: {e}")))?;
        Self::from_json_str(&contents)
    }

    /// Parse a `{"0": "piece", ...}`-shaped JSON string into a vocabulary.
    ///
    /// # Errors
    /// [`Error::ProcessingFailed`] if `contents` is not valid JSON of that shape.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(contents)
            .map_err(|e| Error::ProcessingFailed(format!("parsing vocabulary json: {e}")))?;
        let mut map = HashMap::with_capacity(raw.len());
        for (id, piece) in raw {
            let id: i32 = id
                .parse()
                .map_err(|e| Error::ProcessingFailed(format!("vocabulary id {id:?} not an integer: {e}")))?;
            map.insert(id, piece);
        }
        Ok(Self::from_map(map))
    }

    pub fn piece(&self, id: i32) -> Option<&str> {
        self.tokens.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Join token ids into text, turning `▁`-prefixed pieces into word
    /// boundaries and dropping unknown ids silently.
    pub fn detokenize(&self, ids: &[i32]) -> String {
        let mut out = String::new();
        for &id in ids {
            let Some(piece) = self.piece(id) else { continue };
            for ch in piece.chars() {
                if ch == WORD_BOUNDARY {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                } else {
                    out.push(ch);
                }
            }
        }
        out
    }
}
