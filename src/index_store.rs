use std::{
    ffi::OsString,
    hash::Hasher,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::{
    chunking::Chunk,
    error::{Error, Result},
    vector_index::VectorIndex,
};

const MAGIC: &[u8; 4] = b"RGVX";
const FORMAT_VERSION: u32 = 1;

/// Header size: magic + version + dimension + reserved + count + digest.
const HEADER_SIZE: usize = 32;

/// The two companion files of a persisted index.
///
/// Vector file layout:
/// - 4 bytes: magic `RGVX`
/// - 4 bytes: format version (u32 LE)
/// - 4 bytes: dimension D (u32 LE)
/// - 4 bytes: reserved, zero
/// - 8 bytes: vector count N (u64 LE)
/// - 8 bytes: xxHash64 of the chunk file bytes (u64 LE)
/// - N * D * 4 bytes: normalized f32 LE values in row-major order
///
/// The chunk file is JSON holding the ordered chunk records. The digest ties
/// the pair together so that files from two different saves are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub chunks: PathBuf,
}

impl IndexPaths {
    pub fn for_prefix(prefix: &Path) -> Self {
        Self {
            vectors: with_suffix(prefix, ".vectors"),
            chunks: with_suffix(prefix, ".chunks.json"),
        }
    }

    /// Whether either artifact is present on disk.
    pub fn any_exist(&self) -> bool {
        self.vectors.exists() || self.chunks.exists()
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Serialize)]
struct ChunkArtifactRef<'a> {
    version: u32,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct ChunkArtifact {
    version: u32,
    chunks: Vec<Chunk>,
}

#[derive(Debug)]
struct VectorHeader {
    dimension: usize,
    count: usize,
    chunks_digest: u64,
}

impl VectorHeader {
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        out[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        out[8..12].copy_from_slice(&(self.dimension as u32).to_le_bytes());
        out[16..24].copy_from_slice(&(self.count as u64).to_le_bytes());
        out[24..32].copy_from_slice(&self.chunks_digest.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let corrupt = |reason: &str| Error::CorruptArtifact {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if bytes.len() < HEADER_SIZE {
            return Err(corrupt("file is shorter than the header"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt("bad magic"));
        }
        if le_u32(&bytes[4..8]) != FORMAT_VERSION {
            return Err(corrupt("unsupported format version"));
        }

        let dimension = le_u32(&bytes[8..12]) as usize;
        if dimension == 0 {
            return Err(corrupt("zero dimension"));
        }

        Ok(Self {
            dimension,
            count: le_u64(&bytes[16..24]) as usize,
            chunks_digest: le_u64(&bytes[24..32]),
        })
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn digest(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

/// Persist `index` as `<prefix>.vectors` and `<prefix>.chunks.json`.
///
/// Each file is written to a temporary sibling, synced and renamed into
/// place. Concurrent saves to the same prefix must be serialized by the
/// caller.
pub fn save(index: &VectorIndex, prefix: &Path) -> Result<()> {
    let paths = IndexPaths::for_prefix(prefix);

    let chunk_bytes = serde_json::to_vec(&ChunkArtifactRef {
        version: FORMAT_VERSION,
        chunks: index.chunks(),
    })?;

    let header = VectorHeader {
        dimension: index.dimension(),
        count: index.len(),
        chunks_digest: digest(&chunk_bytes),
    };
    let data = index.raw_vectors();
    let mut vector_bytes =
        Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(data));
    vector_bytes.extend_from_slice(&header.encode());
    vector_bytes.extend_from_slice(bytemuck::cast_slice(data));

    write_atomic(&paths.chunks, &chunk_bytes)?;
    write_atomic(&paths.vectors, &vector_bytes)?;

    tracing::info!(
        chunks = index.len(),
        dimension = index.dimension(),
        prefix = %prefix.display(),
        "saved vector index"
    );
    Ok(())
}

/// Load both artifacts under `prefix` into a new index.
///
/// Fails if either file is missing, damaged, or the two disagree.
pub fn load(prefix: &Path) -> Result<VectorIndex> {
    let paths = IndexPaths::for_prefix(prefix);
    let vector_bytes = read_artifact(&paths.vectors)?;
    let chunk_bytes = read_artifact(&paths.chunks)?;

    let header = VectorHeader::decode(&vector_bytes, &paths.vectors)?;

    let artifact: ChunkArtifact = serde_json::from_slice(&chunk_bytes)
        .map_err(|e| Error::CorruptArtifact {
            path: paths.chunks.clone(),
            reason: e.to_string(),
        })?;
    if artifact.version != FORMAT_VERSION {
        return Err(Error::CorruptArtifact {
            path: paths.chunks,
            reason: format!("unsupported format version {}", artifact.version),
        });
    }

    if header.count != artifact.chunks.len() {
        return Err(Error::CorpusMismatch {
            vectors: header.count,
            chunks: artifact.chunks.len(),
        });
    }
    if header.chunks_digest != digest(&chunk_bytes) {
        return Err(Error::ArtifactPairMismatch(prefix.to_path_buf()));
    }

    let data = &vector_bytes[HEADER_SIZE..];
    let expected_len = header.count * header.dimension * 4;
    if data.len() != expected_len {
        return Err(Error::CorruptArtifact {
            path: paths.vectors,
            reason: format!(
                "expected {expected_len} bytes of vector data, found {}",
                data.len()
            ),
        });
    }
    let vectors: Vec<f32> = bytemuck::allocation::pod_collect_to_vec(data);

    let index =
        VectorIndex::from_parts(header.dimension, vectors, artifact.chunks)?;
    tracing::info!(
        chunks = index.len(),
        dimension = index.dimension(),
        prefix = %prefix.display(),
        "loaded vector index"
    );
    Ok(index)
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::ArtifactMissing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
