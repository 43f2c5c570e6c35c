use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::Result;

/// Default embedding dimension (all-MiniLM-L6-v2 sized vectors).
pub const DEFAULT_DIMENSION: usize = 384;

/// Maps texts to fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, each of length [`Embedder::dimension`]. Failures should be
/// reported as [`crate::Error::EmbedderUnavailable`].
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lowercased alphanumeric word is hashed with xxHash64 into one of
/// `dimension` buckets, with a sign taken from the high bits of the hash.
/// Texts sharing vocabulary end up with a high cosine similarity. Used when
/// no neural model is configured.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(word.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[test]
    fn one_vector_per_text_with_configured_dimension() {
        let embedder = HashEmbedder::new(64);
        let texts = vec!["capital buffer".to_string(), String::new()];
        let vectors = embedder.embed(&texts).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 64));
        assert!(vectors[1].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn deterministic_across_calls() {
        let embedder = HashEmbedder::default();
        let texts = vec!["Liquidity Coverage Ratio".to_string()];
        assert_eq!(
            embedder.embed(&texts).unwrap(),
            embedder.embed(&texts).unwrap()
        );
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let embedder = HashEmbedder::default();
        let vectors = embedder
            .embed(&["Tier 1 capital.".to_string(), "tier 1 CAPITAL".to_string()])
            .unwrap();
        assert_eq!(vectors[0], vectors[1]);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::default();
        let vectors = embedder
            .embed(&[
                "liquidity coverage ratio stress".to_string(),
                "liquidity ratio under stress".to_string(),
                "anti money laundering program".to_string(),
            ])
            .unwrap();
        assert!(
            cosine(&vectors[0], &vectors[1]) > cosine(&vectors[0], &vectors[2])
        );
    }
}
