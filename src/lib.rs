//! regrag - passage retrieval over regulatory documents.
//!
//! Documents are split into overlapping token windows, embedded, and held
//! in a flat cosine-similarity index. Queries retrieve the best matching
//! passages, optionally restricted to a risk type or document type, for a
//! downstream answer generator.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use regrag::{Document, RetrievalService, ServiceOptions};
//! use regrag::embedding::HashEmbedder;
//! use regrag::tokenizer::CharTokenizer;
//!
//! # async fn run() -> regrag::Result<()> {
//! let service = RetrievalService::new(
//!     Arc::new(HashEmbedder::default()),
//!     Arc::new(CharTokenizer),
//!     ServiceOptions::default(),
//! )?;
//!
//! let docs: Vec<Document> =
//!     serde_json::from_str(&std::fs::read_to_string("documents.json")?)?;
//! service.index_documents(&docs).await?;
//!
//! for r in service.query("LCR requirements", 5, Some("Liquidity Risk"), None).await? {
//!     println!("{} (score: {:.3})", r.chunk.metadata.title, r.similarity_score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod data_dir;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index_store;
pub mod keyword;
pub mod service;
pub mod settings;
pub mod text_util;
pub mod tokenizer;
pub mod vector_index;

pub use chunking::{Chunk, Chunker, ChunkingConfig};
pub use data_dir::DataDir;
pub use document::{Document, DocumentMetadata};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use service::{
    IndexStats,
    QueryRequest,
    QueryResponse,
    RetrievalService,
    Scorer,
    ServiceOptions,
};
pub use settings::Settings;
pub use vector_index::{SearchResult, VectorIndex};
