//! TOML configuration.
//!
//! Every section except `[corpus]` is optional and falls back to the
//! defaults below. [`load_config`] parses and validates; the CLI applies
//! flag overrides afterwards and calls [`Config::validate`] again.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use framesift_core::index::{DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_SEARCH, DEFAULT_M};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp", "bmp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_m")]
    pub m: usize,
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
    /// Fixes the level draws so repeated builds produce the same graph.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            seed: None,
        }
    }
}

fn default_m() -> usize {
    DEFAULT_M
}
fn default_ef_construction() -> usize {
    DEFAULT_EF_CONSTRUCTION
}
fn default_ef_search() -> usize {
    DEFAULT_EF_SEARCH
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    32
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Where to write the JSON result array; omitted means no file.
    #[serde(default)]
    pub json_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TranscriptConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Defaults with the current directory as corpus root, for commands
    /// that run without a config file.
    pub fn minimal() -> Self {
        Self {
            corpus: CorpusConfig {
                root: PathBuf::from("."),
                extensions: default_extensions(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
            },
            chunking: ChunkingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            output: OutputConfig::default(),
            transcript: TranscriptConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }

        if self.index.m < 2 {
            bail!("index.m must be >= 2");
        }
        if self.index.ef_construction < self.index.m {
            bail!(
                "index.ef_construction ({}) must be >= index.m ({})",
                self.index.ef_construction,
                self.index.m
            );
        }
        if self.index.ef_search == 0 {
            bail!("index.ef_search must be >= 1");
        }

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }

        if self.corpus.extensions.is_empty() {
            bail!("corpus.extensions must not be empty");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled or local.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
