//! Chunking utilities for splitting documents into overlapping token windows.
//!
//! Windows start at offset 0 and advance by `chunk_size - overlap` tokens
//! until a window reaches the end of the text. Windows whose decoded text is
//! shorter than [`MIN_CHUNK_CHARS`] after trimming are dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    document::DocumentMetadata,
    error::{Error, Result},
    tokenizer::Tokenizer,
};

/// Default window size in tokens.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default number of tokens shared by adjacent windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Trimmed windows shorter than this many characters are not emitted.
pub const MIN_CHUNK_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum window size in tokens.
    pub chunk_size: usize,
    /// Tokens shared by adjacent windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// The window stride must be positive or chunking never advances.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(Error::InvalidChunking {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A window of a document's text ready for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: DocumentMetadata,
    /// Zero-based position among the chunks emitted for the same document.
    pub chunk_index: usize,
    pub token_count: usize,
}

/// Splits text into overlapping token windows.
pub struct Chunker {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        config: ChunkingConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { tokenizer, config })
    }

    /// Split `text` into chunks that all carry a copy of `metadata`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use regrag::chunking::{Chunker, ChunkingConfig};
    /// use regrag::document::DocumentMetadata;
    /// use regrag::tokenizer::CharTokenizer;
    ///
    /// let chunker = Chunker::new(
    ///     Arc::new(CharTokenizer),
    ///     ChunkingConfig::new(100, 10).unwrap(),
    /// )
    /// .unwrap();
    /// let text = "x".repeat(150);
    /// let chunks = chunker.chunk(&text, &DocumentMetadata::default()).unwrap();
    /// assert_eq!(chunks.len(), 2);
    /// assert_eq!(chunks[1].token_count, 60);
    /// ```
    pub fn chunk(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
    ) -> Result<Vec<Chunk>> {
        let tokens = self.tokenizer.encode(text)?;
        let stride = self.config.stride();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + self.config.chunk_size).min(tokens.len());
            let window = &tokens[start..end];
            let decoded = self.tokenizer.decode(window)?;
            let trimmed = decoded.trim();

            if trimmed.chars().count() >= MIN_CHUNK_CHARS {
                chunks.push(Chunk {
                    text: trimmed.to_string(),
                    metadata: metadata.clone(),
                    chunk_index: chunks.len(),
                    token_count: window.len(),
                });
            }

            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        Ok(chunks)
    }
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tokenizer::CharTokenizer;

    fn chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(
            Arc::new(CharTokenizer),
            ChunkingConfig::new(chunk_size, overlap).unwrap(),
        )
        .unwrap()
    }

    fn meta() -> DocumentMetadata {
        DocumentMetadata {
            document_id: "3".into(),
            title: "Regulation YY".into(),
            risk_type: "Capital Risk".into(),
            ..DocumentMetadata::default()
        }
    }

    /// Text without whitespace so trimming never changes a window.
    fn letters(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    #[test]
    fn exactly_chunk_size_tokens_is_one_chunk() {
        let chunks = chunker(512, 50).chunk(&letters(512), &meta()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, 512);
    }

    #[test]
    fn six_hundred_tokens_is_two_chunks() {
        let chunks = chunker(512, 50).chunk(&letters(600), &meta()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].token_count, 512);
        // Second window starts at 462.
        assert_eq!(chunks[1].token_count, 138);
        assert_eq!(chunks[1].text, &letters(600)[462..]);
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = chunker(512, 50).chunk(&letters(80), &meta()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn below_character_floor_yields_nothing() {
        let chunks = chunker(512, 50).chunk("Too short.", &meta()).unwrap();
        assert!(chunks.is_empty());
        assert!(chunker(512, 50).chunk("", &meta()).unwrap().is_empty());
    }

    #[test]
    fn whitespace_is_trimmed_before_measuring() {
        let text = format!("   {}   ", "y".repeat(49));
        let chunks = chunker(512, 50).chunk(&text, &meta()).unwrap();
        assert!(chunks.is_empty(), "49 visible chars fall under the floor");

        let text = format!("\n\n{}\n", "y".repeat(50));
        let chunks = chunker(512, 50).chunk(&text, &meta()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "y".repeat(50));
    }

    #[test]
    fn trailing_fragment_is_discarded_and_indices_stay_dense() {
        // Windows: [0,100), [90,190), [180,200) -> last has 20 tokens.
        let chunks = chunker(100, 10).chunk(&letters(200), &meta()).unwrap();
        assert_eq!(chunks.len(), 2);
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn discarded_middle_window_does_not_leave_gaps() {
        // Second window is pure whitespace and is dropped.
        let text =
            format!("{}{}{}", letters(100), " ".repeat(100), letters(100));
        let chunks = chunker(100, 0).chunk(&text, &meta()).unwrap();
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(chunks[1].text, letters(100));
    }

    #[test]
    fn all_chunks_share_metadata() {
        let chunks = chunker(100, 10).chunk(&letters(450), &meta()).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata == meta()));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(matches!(
            ChunkingConfig::new(50, 50),
            Err(Error::InvalidChunking {
                chunk_size: 50,
                overlap: 50
            })
        ));
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(10, 9).is_ok());
    }

    #[test]
    fn chunker_rejects_invalid_config() {
        let config = ChunkingConfig {
            chunk_size: 10,
            overlap: 20,
        };
        assert!(Chunker::new(Arc::new(CharTokenizer), config).is_err());
    }

    proptest! {
        #[test]
        fn windows_overlap_and_cover_the_end(
            len in 0usize..3000,
            chunk_size in 60usize..400,
            overlap_frac in 0.0f64..0.9,
        ) {
            let overlap = (chunk_size as f64 * overlap_frac) as usize;
            let text = letters(len);
            let chunks = chunker(chunk_size, overlap).chunk(&text, &meta()).unwrap();

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index, i);
                prop_assert!(chunk.token_count <= chunk_size);
                prop_assert_eq!(chunk.token_count, chunk.text.chars().count());
            }

            for pair in chunks.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.token_count == chunk_size && b.token_count >= overlap {
                    prop_assert_eq!(
                        &a.text[chunk_size - overlap..],
                        &b.text[..overlap]
                    );
                }
            }

            prop_assert_eq!(chunks.is_empty(), len < MIN_CHUNK_CHARS);
        }
    }
}
