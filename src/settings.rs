//! Layered runtime settings.
//!
//! Sources, lowest priority first: built-in defaults, `config.toml` in the
//! data directory, then `REGRAG_*` environment variables
//! (`REGRAG_CHUNK_SIZE=256`, `REGRAG_TOP_K=10`, ...).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    data_dir::DataDir,
    embedding::DEFAULT_DIMENSION,
    error::{Error, Result},
    service::DEFAULT_TOP_K,
};

const ENV_PREFIX: &str = "REGRAG_";

/// Keys under the prefix that belong to the binary, not to `Settings`.
const RESERVED_ENV_KEYS: &[&str] = &["data_dir", "log"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Embedding dimension used when no model reports one.
    pub dimension: usize,
    pub top_k: usize,
    pub embed_timeout_secs: u64,
    /// Basename of the persisted index inside the data directory.
    pub index_name: String,
    /// `tokenizer.json` to count tokens with. Characters are counted when
    /// unset.
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            dimension: DEFAULT_DIMENSION,
            top_k: DEFAULT_TOP_K,
            embed_timeout_secs: 30,
            index_name: "regulatory_index".to_string(),
            tokenizer_path: None,
        }
    }
}

impl Settings {
    /// Load settings for `data_dir`, including environment overrides.
    pub fn load(data_dir: &DataDir) -> Result<Self> {
        let figment = Self::file_figment(&data_dir.config_file()).merge(
            Env::prefixed(ENV_PREFIX).ignore(RESERVED_ENV_KEYS),
        );
        Self::extract(figment)
    }

    /// Defaults overlaid with a single TOML file. A missing file is not an
    /// error.
    fn file_figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking()?;
        if self.dimension == 0 {
            return Err(Error::Config("dimension must be positive".into()));
        }
        if self.embed_timeout_secs == 0 {
            return Err(Error::Config(
                "embed_timeout_secs must be positive".into(),
            ));
        }
        if self.index_name.is_empty() {
            return Err(Error::Config("index_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_file(path: &Path) -> Result<Settings> {
        Settings::extract(Settings::file_figment(path))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = load_file(&tmp.path().join("none.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.chunking().unwrap(), ChunkingConfig::default());
        assert_eq!(settings.embed_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn file_overrides_only_given_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "chunk_size = 256\ntokenizer_path = \"/opt/tok.json\"\n",
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.chunk_size, 256);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(
            settings.tokenizer_path.as_deref(),
            Some(Path::new("/opt/tok.json"))
        );
        assert_eq!(settings.index_name, "regulatory_index");
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "chunk_size = 40\nchunk_overlap = 40\n").unwrap();

        assert!(matches!(
            load_file(&path),
            Err(Error::InvalidChunking {
                chunk_size: 40,
                overlap: 40
            })
        ));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "top_k = \"many\"\n").unwrap();

        assert!(matches!(load_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn load_reads_config_from_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::resolve(Some(tmp.path())).unwrap();
        std::fs::write(data_dir.config_file(), "index_name = \"fed_rules\"\n")
            .unwrap();

        let settings = Settings::load(&data_dir).unwrap();
        assert_eq!(settings.index_name, "fed_rules");
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let settings = Settings {
            dimension: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }
}
