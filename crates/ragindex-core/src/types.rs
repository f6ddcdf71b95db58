//! Domain types shared by the chunker, both indexes and the retrieval service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// A source document as produced by ingestion. Consumed only by the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub title: String,
    pub body: String,
}

/// Segmentation strategy a chunk was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Fixed,
    Sentence,
}

impl ChunkStrategy {
    pub const ALL: [ChunkStrategy; 2] = [ChunkStrategy::Fixed, ChunkStrategy::Sentence];

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkStrategy::Fixed => "fixed",
            ChunkStrategy::Sentence => "sentence",
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(ChunkStrategy::Fixed),
            "sentence" => Ok(ChunkStrategy::Sentence),
            other => Err(Error::InvalidConfig(format!("unknown chunk strategy '{other}'"))),
        }
    }
}

/// The atomic retrievable unit.
///
/// - `id`: `<strategy>_<seq>`, unique within one index generation
/// - `source`/`title`: copied from the parent document
/// - `text`: the passage itself, never split mid-sentence for `Sentence`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub title: String,
    pub text: String,
    pub strategy: ChunkStrategy,
}

/// Indicates which ranking signal produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lexical,
    Dense,
    Fused,
}

/// The minimal surface returned by both indexes and by fusion.
///
/// `id` matches `Chunk::id` and `row` is the chunk's position in the corpus
/// the index was built from. `score` is engine-specific but higher is
/// always better; scores from different sources are not comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub row: usize,
    pub score: f32,
    pub source: SourceKind,
}

/// A resolved search result handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub source: SourceKind,
}

/// Which index (or both) a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Lexical,
    Dense,
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Lexical => "lexical",
            SearchMode::Dense => "dense",
            SearchMode::Hybrid => "hybrid",
        })
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lexical" | "bm25" => Ok(SearchMode::Lexical),
            "dense" => Ok(SearchMode::Dense),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::InvalidConfig(format!("unknown search mode '{other}'"))),
        }
    }
}
