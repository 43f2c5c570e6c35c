//! Retrieval service tying chunking, embedding and the vector index together.
//!
//! The live index sits behind an async `RwLock`. Indexing chunks and embeds
//! outside the lock and only takes the write lock to append, so concurrent
//! queries observe either the previous or the extended index.

use std::{collections::BTreeSet, path::Path, sync::Arc, time::Duration};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    chunking::{Chunk, Chunker, ChunkingConfig},
    document::Document,
    embedding::Embedder,
    error::{Error, Result},
    index_store,
    keyword::KeywordScorer,
    tokenizer::Tokenizer,
    vector_index::{SearchResult, VectorIndex, is_finite},
};

/// Default number of results per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Default upper bound on a single embedder call.
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Candidates fetched per requested result before metadata filtering.
const OVERSAMPLE_FACTOR: usize = 2;

/// How query candidates are ranked.
#[derive(Debug, Clone, Default)]
pub enum Scorer {
    /// Cosine similarity between the embedded query and stored vectors.
    #[default]
    Cosine,
    /// Keyword-weighted scoring over stored chunk text. Queries never reach
    /// the embedder.
    Keyword(KeywordScorer),
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub chunking: ChunkingConfig,
    pub embed_timeout: Duration,
    pub scorer: Scorer,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
            scorer: Scorer::default(),
        }
    }
}

/// A query as received from an outer API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub risk_type: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            risk_type: None,
            document_type: None,
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<SearchResult>,
    pub total_chunks: usize,
    pub query: String,
}

/// Summary of what the index currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub unique_documents: usize,
    pub document_types: Vec<String>,
    pub risk_types: Vec<String>,
}

pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    chunker: Arc<Chunker>,
    index: RwLock<VectorIndex>,
    index_lock: Mutex<()>,
    save_lock: Mutex<()>,
    embed_timeout: Duration,
    scorer: Scorer,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        tokenizer: Arc<dyn Tokenizer>,
        options: ServiceOptions,
    ) -> Result<Self> {
        let chunker = Chunker::new(tokenizer, options.chunking)?;
        let index = VectorIndex::new(embedder.dimension());
        Ok(Self {
            embedder,
            chunker: Arc::new(chunker),
            index: RwLock::new(index),
            index_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            embed_timeout: options.embed_timeout,
            scorer: options.scorer,
        })
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Chunk, embed and index `documents`, returning the number of chunks
    /// added.
    ///
    /// All chunk texts go to the embedder in a single call. Nothing is added
    /// if any step fails.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<usize> {
        let _indexing = self.index_lock.lock().await;

        let chunker = Arc::clone(&self.chunker);
        let owned = documents.to_vec();
        let chunks = tokio::task::spawn_blocking(move || chunk_all(&chunker, &owned))
            .await
            .map_err(std::io::Error::from)??;

        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "embedding chunks"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(texts).await?;

        let added = chunks.len();
        let mut index = self.index.write().await;
        index.add(vectors, chunks)?;
        info!(added, total = index.len(), "indexed documents");
        Ok(added)
    }

    /// Retrieve up to `top_k` chunks for `text`, optionally restricted to a
    /// risk type and/or document type.
    ///
    /// `2 * top_k` candidates are ranked first and the filters are applied
    /// afterwards, so a selective filter can return fewer than `top_k`
    /// results even when more matching chunks exist.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        risk_type: Option<&str>,
        document_type: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if self.is_empty().await {
            return Err(Error::NotIndexed);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let candidates_k = top_k.saturating_mul(OVERSAMPLE_FACTOR);
        let candidates = match &self.scorer {
            Scorer::Cosine => {
                let augmented = augment_query(text, risk_type, document_type);
                let mut vectors = self.embed(vec![augmented]).await?;
                let query = vectors.pop().ok_or_else(|| {
                    Error::EmbedderUnavailable(
                        "embedder returned no vector for the query".into(),
                    )
                })?;
                self.index.read().await.search(&query, candidates_k)?
            }
            Scorer::Keyword(scorer) => {
                let index = self.index.read().await;
                scorer.rank(text, index.chunks(), candidates_k)
            }
        };

        let candidate_count = candidates.len();
        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|r| matches_filters(&r.chunk, risk_type, document_type))
            .take(top_k)
            .collect();
        debug!(
            candidates = candidate_count,
            returned = results.len(),
            "query complete"
        );
        Ok(results)
    }

    /// Run a [`QueryRequest`] and wrap the results for an API response.
    pub async fn search(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let results = self
            .query(
                &request.query,
                request.top_k,
                request.risk_type.as_deref(),
                request.document_type.as_deref(),
            )
            .await?;
        Ok(QueryResponse {
            results,
            total_chunks: self.len().await,
            query: request.query.clone(),
        })
    }

    /// Persist the current index under `prefix`.
    pub async fn save(&self, prefix: &Path) -> Result<()> {
        let _saving = self.save_lock.lock().await;
        let snapshot = self.index.read().await.clone();
        let prefix = prefix.to_path_buf();
        tokio::task::spawn_blocking(move || index_store::save(&snapshot, &prefix))
            .await
            .map_err(std::io::Error::from)?
    }

    /// Replace the live index with the one persisted under `prefix`,
    /// returning its size.
    ///
    /// The current index is kept if loading fails or the stored vectors do
    /// not match the embedder's dimension.
    pub async fn load(&self, prefix: &Path) -> Result<usize> {
        let _indexing = self.index_lock.lock().await;
        let owned = prefix.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || index_store::load(&owned))
            .await
            .map_err(std::io::Error::from)??;

        if loaded.dimension() != self.embedder.dimension() {
            return Err(Error::IndexDimension {
                expected: self.embedder.dimension(),
                actual: loaded.dimension(),
            });
        }

        let count = loaded.len();
        *self.index.write().await = loaded;
        info!(chunks = count, prefix = %prefix.display(), "loaded index");
        Ok(count)
    }

    pub async fn stats(&self) -> IndexStats {
        let index = self.index.read().await;
        let mut documents = BTreeSet::new();
        let mut document_types = BTreeSet::new();
        let mut risk_types = BTreeSet::new();
        for chunk in index.chunks() {
            let meta = &chunk.metadata;
            documents.insert(meta.document_id.as_str());
            document_types.insert(meta.doc_type.as_str());
            risk_types.insert(meta.risk_type.as_str());
        }
        IndexStats {
            total_chunks: index.len(),
            unique_documents: documents.len(),
            document_types: document_types.into_iter().map(String::from).collect(),
            risk_types: risk_types.into_iter().map(String::from).collect(),
        }
    }

    /// Call the embedder on the blocking pool, bounded by the configured
    /// timeout.
    ///
    /// Output that breaks the [`Embedder`] contract (wrong count, wrong
    /// length, non-finite values) is reported as
    /// [`Error::EmbedderUnavailable`].
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let requested = texts.len();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&texts));

        let vectors = match tokio::time::timeout(self.embed_timeout, task).await
        {
            Err(_) => return Err(Error::EmbedderTimeout(self.embed_timeout)),
            Ok(Err(join)) => {
                return Err(Error::EmbedderUnavailable(join.to_string()));
            }
            Ok(Ok(Err(err @ Error::EmbedderUnavailable(_)))) => {
                return Err(err);
            }
            Ok(Ok(Err(err))) => {
                return Err(Error::EmbedderUnavailable(err.to_string()));
            }
            Ok(Ok(Ok(vectors))) => vectors,
        };

        check_embeddings(&vectors, requested, self.embedder.dimension())?;
        Ok(vectors)
    }
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("chunker", &self.chunker)
            .field("embed_timeout", &self.embed_timeout)
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}

fn check_embeddings(
    vectors: &[Vec<f32>],
    requested: usize,
    dimension: usize,
) -> Result<()> {
    if vectors.len() != requested {
        return Err(Error::EmbedderUnavailable(format!(
            "embedder returned {} vectors for {requested} texts",
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(Error::EmbedderUnavailable(format!(
            "embedder returned a {}-dimensional vector, expected {dimension}",
            bad.len()
        )));
    }
    if let Some(row) = vectors.iter().position(|v| !is_finite(v)) {
        return Err(Error::EmbedderUnavailable(format!(
            "embedder returned non-finite values for text {row}"
        )));
    }
    Ok(())
}

fn chunk_all(chunker: &Chunker, documents: &[Document]) -> Result<Vec<Chunk>> {
    let per_document = documents
        .par_iter()
        .map(|doc| chunker.chunk(&doc.composite_text(), &doc.metadata()))
        .collect::<Result<Vec<_>>>()?;
    Ok(per_document.into_iter().flatten().collect())
}

/// Prefix the query with domain context and any active filters.
pub fn augment_query(
    text: &str,
    risk_type: Option<&str>,
    document_type: Option<&str>,
) -> String {
    let mut augmented = format!("Banking regulation: {text}");
    if let Some(risk) = risk_type {
        augmented.push_str(&format!(" Risk type: {risk}"));
    }
    if let Some(doc_type) = document_type {
        augmented.push_str(&format!(" Document type: {doc_type}"));
    }
    augmented
}

fn matches_filters(
    chunk: &Chunk,
    risk_type: Option<&str>,
    document_type: Option<&str>,
) -> bool {
    let same = |stored: &str, wanted: &str| {
        stored.to_lowercase() == wanted.to_lowercase()
    };
    risk_type.is_none_or(|r| same(&chunk.metadata.risk_type, r))
        && document_type.is_none_or(|d| same(&chunk.metadata.doc_type, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::DocumentMetadata, tokenizer::CharTokenizer};

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Tokenizer("model not loaded".into()))
        }
    }

    fn chunk(risk: &str, doc_type: &str) -> Chunk {
        Chunk {
            text: "text".into(),
            metadata: DocumentMetadata {
                risk_type: risk.into(),
                doc_type: doc_type.into(),
                ..DocumentMetadata::default()
            },
            chunk_index: 0,
            token_count: 4,
        }
    }

    fn document(id: &str) -> Document {
        Document {
            id: id.into(),
            title: "Liquidity Coverage Ratio".into(),
            content: "Banks must hold high quality liquid assets. ".repeat(4),
            ..Document::default()
        }
    }

    #[test]
    fn embeddings_breaking_the_contract_are_unavailable() {
        let ok = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(check_embeddings(&ok, 2, 2).is_ok());

        for (vectors, requested, dimension) in [
            (vec![vec![1.0, 0.0]], 2, 2),
            (vec![vec![1.0, 0.0, 0.0]], 1, 2),
            (vec![vec![f32::NAN, 0.0]], 1, 2),
        ] {
            let err =
                check_embeddings(&vectors, requested, dimension).unwrap_err();
            assert!(matches!(err, Error::EmbedderUnavailable(_)), "{err:?}");
            assert!(!err.is_client_error());
        }
    }

    #[test]
    fn augmentation_appends_filters() {
        assert_eq!(
            augment_query("CET1 minimum", None, None),
            "Banking regulation: CET1 minimum"
        );
        assert_eq!(
            augment_query("CET1", Some("Capital"), Some("Rule")),
            "Banking regulation: CET1 Risk type: Capital Document type: Rule"
        );
        assert_eq!(
            augment_query("CET1", None, Some("Rule")),
            "Banking regulation: CET1 Document type: Rule"
        );
    }

    #[test]
    fn filters_are_case_insensitive_equality() {
        let c = chunk("Capital Risk", "Final Rule");
        assert!(matches_filters(&c, None, None));
        assert!(matches_filters(&c, Some("capital risk"), None));
        assert!(matches_filters(&c, Some("CAPITAL RISK"), Some("final rule")));
        assert!(!matches_filters(&c, Some("Capital"), None));
        assert!(!matches_filters(&c, None, Some("Guidance")));
    }

    #[test]
    fn request_defaults_top_k() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"query": "stress testing"}"#).unwrap();
        assert_eq!(req, QueryRequest::new("stress testing"));
        assert_eq!(req.top_k, 5);
    }

    #[tokio::test]
    async fn embedder_failures_surface_as_unavailable() {
        let service = RetrievalService::new(
            Arc::new(FailingEmbedder),
            Arc::new(CharTokenizer),
            ServiceOptions::default(),
        )
        .unwrap();

        let err = service.index_documents(&[document("1")]).await.unwrap_err();
        assert!(matches!(err, Error::EmbedderUnavailable(_)), "{err:?}");
        assert!(service.is_empty().await);
    }

    #[tokio::test]
    async fn stats_on_empty_index() {
        let service = RetrievalService::new(
            Arc::new(FailingEmbedder),
            Arc::new(CharTokenizer),
            ServiceOptions::default(),
        )
        .unwrap();
        let stats = service.stats().await;
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.unique_documents, 0);
        assert!(stats.document_types.is_empty());
    }
}
