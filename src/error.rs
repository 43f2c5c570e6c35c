use std::{path::PathBuf, time::Duration};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error(
        "invalid chunking: overlap {overlap} must be smaller than chunk size {chunk_size}"
    )]
    InvalidChunking { chunk_size: usize, overlap: usize },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("got {vectors} vectors for {chunks} chunks")]
    LengthMismatch { vectors: usize, chunks: usize },

    #[error("vector {row} contains a NaN or infinite component")]
    NonFiniteVector { row: usize },

    #[error("index artifact missing: {0}")]
    ArtifactMissing(PathBuf),

    #[error("index artifact {path} is corrupt: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error(
        "index artifacts disagree: {vectors} vectors but {chunks} chunk records"
    )]
    CorpusMismatch { vectors: usize, chunks: usize },

    #[error("index artifacts under {0} were written by different saves")]
    ArtifactPairMismatch(PathBuf),

    #[error(
        "persisted index has dimension {actual}, embedder produces {expected}"
    )]
    IndexDimension { expected: usize, actual: usize },

    #[error("no chunks were produced from the supplied documents")]
    EmptyCorpus,

    #[error("no documents have been indexed yet")]
    NotIndexed,

    #[error("embedder did not respond within {0:?}")]
    EmbedderTimeout(Duration),

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),
}

impl Error {
    /// Whether the failure was caused by the caller's input rather than by
    /// the embedder, the filesystem or a damaged index.
    ///
    /// An API layer maps these to client-error responses.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidChunking { .. }
                | Error::DimensionMismatch { .. }
                | Error::LengthMismatch { .. }
                | Error::NonFiniteVector { .. }
                | Error::EmptyCorpus
                | Error::NotIndexed
        )
    }
}
