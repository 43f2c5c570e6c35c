//! Tokenizers used to measure and split text for chunking.

use std::path::Path;

use crate::error::{Error, Result};

/// Maps text to token ids and back.
///
/// `decode(encode(x))` must reproduce readable text, since chunk text is
/// produced by decoding token windows.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Treats every Unicode scalar value as one token.
///
/// Lossless and dependency-free; used when no `tokenizer.json` is configured.
///
/// # Examples
///
/// ```
/// use regrag::tokenizer::{CharTokenizer, Tokenizer};
///
/// let ids = CharTokenizer.encode("naïve").unwrap();
/// assert_eq!(ids.len(), 5);
/// assert_eq!(CharTokenizer.decode(&ids).unwrap(), "naïve");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.chars().map(u32::from).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        ids.iter()
            .map(|&id| {
                char::from_u32(id).ok_or_else(|| {
                    Error::Tokenizer(format!("invalid code point {id:#x}"))
                })
            })
            .collect()
    }
}

/// Adapter over a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(format!(
                "failed to load tokenizer from {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        // Special tokens would be decoded into the chunk text.
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(format!("encoding failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::Tokenizer(format!("decoding failed: {e}")))
    }
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer").finish_non_exhaustive()
    }
}
