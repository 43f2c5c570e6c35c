//! Keyword-weighted fallback scorer.
//!
//! Used when no embedding model should be consulted for queries. The weight
//! table is fixed demo data; scores are not comparable with cosine scores.

use crate::{chunking::Chunk, vector_index::SearchResult};

const BASE_SCORE: f32 = 0.5;
const MAX_SCORE: f32 = 0.98;
const TITLE_FACTOR: f32 = 0.5;

/// Keyword weights for regulatory vocabulary.
pub const DEFAULT_WEIGHTS: &[(&str, f32)] = &[
    ("capital", 0.3),
    ("requirement", 0.3),
    ("basel", 0.4),
    ("tier", 0.3),
    ("fry", 0.5),
    ("report", 0.2),
    ("liquidity", 0.4),
    ("lcr", 0.4),
    ("stress", 0.3),
    ("test", 0.2),
    ("regulation", 0.2),
    ("prudential", 0.3),
    ("ratio", 0.2),
    ("asset", 0.2),
    ("buffer", 0.3),
    ("risk", 0.2),
    ("aml", 0.5),
    ("money", 0.3),
    ("laundering", 0.4),
    ("bsa", 0.4),
    ("suspicious", 0.4),
    ("activity", 0.3),
    ("ctr", 0.4),
    ("sar", 0.4),
    ("cyber", 0.4),
    ("security", 0.3),
    ("authentication", 0.3),
    ("breach", 0.4),
    ("incident", 0.3),
    ("vulnerability", 0.3),
    ("penetration", 0.3),
    ("fair", 0.3),
    ("lending", 0.4),
    ("discrimination", 0.4),
    ("ecoa", 0.4),
    ("hmda", 0.4),
    ("redlining", 0.4),
    ("consumer", 0.3),
    ("protection", 0.3),
    ("operational", 0.3),
    ("continuity", 0.3),
    ("model", 0.3),
    ("validation", 0.4),
    ("credit", 0.3),
    ("underwriting", 0.4),
    ("portfolio", 0.3),
    ("exposure", 0.3),
    ("interest", 0.3),
    ("rate", 0.3),
    ("duration", 0.3),
    ("repricing", 0.3),
    ("vendor", 0.3),
    ("third", 0.3),
    ("party", 0.3),
    ("due", 0.3),
    ("diligence", 0.4),
];

#[derive(Debug, Clone)]
pub struct KeywordScorer {
    weights: Vec<(String, f32)>,
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHTS.iter().map(|&(k, w)| (k.to_string(), w)))
    }
}

impl KeywordScorer {
    pub fn new(weights: impl IntoIterator<Item = (String, f32)>) -> Self {
        Self {
            weights: weights
                .into_iter()
                .map(|(k, w)| (k.to_lowercase(), w))
                .collect(),
        }
    }

    /// Score one chunk against a query.
    ///
    /// Starts at 0.5; every keyword present in the query adds its weight when
    /// the chunk text contains it and half its weight when the title does.
    /// Matching is substring-based and case-insensitive. Capped at 0.98.
    ///
    /// # Examples
    ///
    /// ```
    /// use regrag::chunking::Chunk;
    /// use regrag::document::DocumentMetadata;
    /// use regrag::keyword::KeywordScorer;
    ///
    /// let chunk = Chunk {
    ///     text: "Basel III liquidity rules".into(),
    ///     metadata: DocumentMetadata::default(),
    ///     chunk_index: 0,
    ///     token_count: 4,
    /// };
    /// let score = KeywordScorer::default().score("basel", &chunk);
    /// assert!((score - 0.9).abs() < 1e-6);
    /// ```
    pub fn score(&self, query: &str, chunk: &Chunk) -> f32 {
        let query = query.to_lowercase();
        let text = chunk.text.to_lowercase();
        let title = chunk.metadata.title.to_lowercase();

        let mut score = BASE_SCORE;
        for (keyword, weight) in &self.weights {
            if !query.contains(keyword.as_str()) {
                continue;
            }
            if text.contains(keyword.as_str()) {
                score += weight;
            }
            if title.contains(keyword.as_str()) {
                score += weight * TITLE_FACTOR;
            }
        }
        score.min(MAX_SCORE)
    }

    /// Rank `chunks` by keyword score, highest first, keeping storage order
    /// for equal scores.
    pub fn rank(
        &self,
        query: &str,
        chunks: &[Chunk],
        top_k: usize,
    ) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, self.score(query, chunk)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| SearchResult {
                chunk: chunks[i].clone(),
                similarity_score: score,
            })
            .collect()
    }
}
