//! Flat cosine-similarity index over chunk embeddings.
//!
//! Vectors are stored L2-normalized in one row-major buffer next to a
//! parallel `Vec<Chunk>`: row `i` of the buffer always belongs to chunk `i`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    chunking::Chunk,
    error::{Error, Result},
};

/// A chunk returned by a search together with its cosine similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub similarity_score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Row-major normalized vectors: `vectors[i * dimension..(i + 1) * dimension]`.
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Rebuild an index from already-normalized rows.
    ///
    /// Used by the persistence layer, which has validated the shapes.
    pub(crate) fn from_parts(
        dimension: usize,
        vectors: Vec<f32>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        if vectors.len() != chunks.len() * dimension {
            return Err(Error::CorpusMismatch {
                vectors: vectors.len() / dimension.max(1),
                chunks: chunks.len(),
            });
        }
        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Flat normalized vector data, `len() * dimension()` values.
    pub fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Append vectors and their chunks, preserving input order.
    ///
    /// The whole batch is validated before anything is stored, so a failed
    /// call leaves the index as it was.
    ///
    /// # Examples
    ///
    /// ```
    /// use regrag::chunking::Chunk;
    /// use regrag::document::DocumentMetadata;
    /// use regrag::vector_index::VectorIndex;
    ///
    /// let chunk = Chunk {
    ///     text: "Minimum CET1 ratio of 4.5% of risk-weighted assets".into(),
    ///     metadata: DocumentMetadata::default(),
    ///     chunk_index: 0,
    ///     token_count: 12,
    /// };
    /// let mut index = VectorIndex::new(3);
    /// index.add(vec![vec![3.0, 4.0, 0.0]], vec![chunk]).unwrap();
    /// assert_eq!(index.len(), 1);
    ///
    /// let hits = index.search(&[3.0, 4.0, 0.0], 5).unwrap();
    /// assert!((hits[0].similarity_score - 1.0).abs() < 1e-6);
    /// ```
    pub fn add(
        &mut self,
        mut vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        if vectors.len() != chunks.len() {
            return Err(Error::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        if let Some(row) = vectors.iter().position(|v| !is_finite(v)) {
            return Err(Error::NonFiniteVector { row });
        }

        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in &mut vectors {
            normalize(vector);
            self.vectors.extend_from_slice(vector);
        }
        self.chunks.extend(chunks);
        Ok(())
    }

    /// Exhaustive cosine search.
    ///
    /// Returns at most `top_k` results in descending similarity; equal scores
    /// keep insertion order. An empty index yields no results.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if !is_finite(query) {
            return Err(Error::NonFiniteVector { row: 0 });
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_chunks_exact(self.dimension)
            .map(|row| dot(row, &query))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: self.chunks[position].clone(),
                similarity_score: score,
            })
            .collect())
    }
}

/// Scale `vector` to unit length. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub(crate) fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
