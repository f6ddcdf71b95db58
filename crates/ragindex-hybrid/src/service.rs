use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

use ragindex_core::error::Error;
use ragindex_core::traits::Embedder;
use ragindex_core::types::{Chunk, RetrievedChunk, SearchHit, SearchMode};
use ragindex_text::LexicalIndex;
use ragindex_vector::DenseIndex;

use crate::fusion::FusionRanker;
use crate::store::{check_alignment, Generation};

/// Read-only query front end over one loaded generation. Share it behind an
/// `Arc`; every method takes `&self`.
pub struct RetrievalService {
    chunks: Vec<Chunk>,
    rows: HashMap<String, usize>,
    lexical: LexicalIndex,
    dense: DenseIndex,
    embedder: Box<dyn Embedder>,
    fusion: FusionRanker,
}

impl RetrievalService {
    pub fn new(generation: Generation, fusion: FusionRanker) -> Result<Self> {
        let Generation { chunks, lexical, dense, embedder, .. } = generation;
        check_alignment(&chunks, lexical.ids(), "lexical")?;
        check_alignment(&chunks, dense.ids(), "dense")?;
        let rows: HashMap<String, usize> = chunks.iter().enumerate().map(|(row, c)| (c.id.clone(), row)).collect();
        if rows.len() != chunks.len() {
            return Err(Error::IndexStateMismatch("chunk list repeats an id".into()).into());
        }
        Ok(Self { chunks, rows, lexical, dense, embedder, fusion })
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Top `k` chunks for `query`. Hybrid mode fuses `2k` candidates from each index.
    pub async fn search(&self, query: &str, mode: SearchMode, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.chunks.is_empty() { return Ok(vec![]); }
        let hits = match mode {
            SearchMode::Lexical => self.lexical.search(query, k)?,
            SearchMode::Dense => self.dense.search(query, self.embedder.as_ref(), k).await?,
            SearchMode::Hybrid => {
                let candidates = k.saturating_mul(2);
                let lexical = self.lexical.search(query, candidates)?;
                let dense = self.dense.search(query, self.embedder.as_ref(), candidates).await?;
                let mut fused = self.fusion.combine(&lexical, &dense);
                fused.truncate(k);
                fused
            }
        };
        debug!("{mode} query {:?}: {} results", query, hits.len());
        hits.into_iter().map(|hit| self.resolve(hit)).collect()
    }

    fn resolve(&self, hit: SearchHit) -> Result<RetrievedChunk> {
        let row = *self.rows.get(&hit.id)
            .ok_or_else(|| Error::IndexStateMismatch(format!("hit {:?} is not in the chunk list", hit.id)))?;
        Ok(RetrievedChunk { chunk: self.chunks[row].clone(), score: hit.score, source: hit.source })
    }
}
