use anyhow::Result;
use std::hash::Hasher;
use std::path::Path;
use twox_hash::XxHash64;

use ragindex_core::error::Error;
use ragindex_core::traits::{l2_normalize, Embedder};

use crate::descriptor::{write_descriptor, EmbedderDescriptor};

/// Deterministic bag-of-words embedder: every lower-cased alphanumeric token
/// adds one to the bucket picked by its xxHash64. Needs no model files.
pub struct HashingEmbedder {
    id: String,
    dim: usize,
    max_len: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize, max_len: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig("hashing embedder needs dim > 0".into()).into()); }
        Ok(Self { id: format!("hashing:xxh64:d{dim}"), dim, max_len })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let tokens = text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).take(self.max_len);
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.to_lowercase().as_bytes());
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String], normalize: bool) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| {
            let mut v = self.embed_one(t);
            if normalize { l2_normalize(&mut v); }
            v
        }).collect())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        write_descriptor(dir, &EmbedderDescriptor::Hashing { dim: self.dim, max_len: self.max_len })
    }
}
