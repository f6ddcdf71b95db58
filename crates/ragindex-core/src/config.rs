//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` env vars (`__` separates nested keys,
//! e.g. `APP_RETRIEVAL__TOP_K=10`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::{ChunkStrategy, SearchMode};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load with `path` as the base file; the env overlay is looked up next to it.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.retrieval.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_dir: String,
    pub chunks_dir: String,
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".to_string(),
            chunks_dir: "data/processed".to_string(),
            index_dir: "data/index".to_string(),
        }
    }
}

impl DataSettings {
    pub fn raw_dir(&self) -> PathBuf {
        expand_path(&self.raw_dir)
    }

    pub fn chunks_dir(&self) -> PathBuf {
        expand_path(&self.chunks_dir)
    }

    /// The chunk file the index is built from.
    pub fn chunks_file(&self) -> PathBuf {
        self.chunks_dir().join("chunks.jsonl")
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.index_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Strategy copied to `chunks.jsonl` for indexing.
    pub strategy: ChunkStrategy,
    /// Fixed window size in whitespace-delimited words.
    pub window: usize,
    /// Words shared between consecutive fixed windows.
    pub overlap: usize,
    /// Character budget that closes a sentence-aware chunk.
    pub target_chars: usize,
    /// Sentences carried into the next sentence-aware chunk.
    pub overlap_sentences: usize,
    /// Sentences at or below this length are discarded as noise.
    pub min_sentence_chars: usize,
    /// Chunks at or below this length are never indexed.
    pub min_chunk_chars: usize,
    /// Documents whose body is at or below this length are skipped.
    pub min_document_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Sentence,
            window: 400,
            overlap: 80,
            target_chars: 1200,
            overlap_sentences: 2,
            min_sentence_chars: 20,
            min_chunk_chars: 100,
            min_document_chars: 200,
        }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.window == 0 {
            return Err(Error::InvalidConfig("chunking.window must be > 0".into()));
        }
        if self.overlap >= self.window {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.window ({})",
                self.overlap, self.window
            )));
        }
        if self.target_chars == 0 {
            return Err(Error::InvalidConfig("chunking.target_chars must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Hashing,
    Transformer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub kind: EmbedderKind,
    /// Directory holding `config.json`, `tokenizer.json` and weights.
    pub model_dir: Option<String>,
    /// Bucket count for the hashing embedder; transformer models report their own.
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { kind: EmbedderKind::Hashing, model_dir: None, dim: 384, max_len: 256, batch_size: 64 }
    }
}

impl EmbeddingSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        if self.kind == EmbedderKind::Transformer && self.model_dir.is_none() {
            return Err(Error::InvalidConfig("embedding.model_dir is required for the transformer embedder".into()));
        }
        Ok(())
    }

    pub fn model_dir(&self) -> Option<PathBuf> {
        self.model_dir.as_deref().map(expand_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub mode: SearchMode,
    pub top_k: usize,
    /// RRF damping constant.
    pub rrf_k: usize,
    /// Per-chunk character budget when building a generator prompt.
    pub context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { mode: SearchMode::Hybrid, top_k: 5, rrf_k: 60, context_chars: 600 }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
