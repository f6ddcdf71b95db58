//! ragindex-embed
//!
//! Embedder implementations behind `ragindex_core::traits::Embedder`: a
//! model-free hashing embedder and a candle transformer encoder. A saved
//! embedder directory carries an `embedder.json` descriptor that
//! `restore_embedder` reads back.

use anyhow::Result;
use std::path::Path;

use ragindex_core::config::{EmbedderKind, EmbeddingSettings};
use ragindex_core::error::Error;
use ragindex_core::traits::Embedder;

pub mod descriptor;
pub mod device;
pub mod hashing;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use descriptor::{EmbedderDescriptor, DESCRIPTOR_FILE};
pub use hashing::HashingEmbedder;
pub use model::TransformerEmbedder;
pub use pool::{masked_mean, masked_mean_l2};

/// Build the embedder selected by configuration.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    match settings.kind {
        EmbedderKind::Hashing => Ok(Box::new(HashingEmbedder::new(settings.dim, settings.max_len)?)),
        EmbedderKind::Transformer => {
            let dir = settings.model_dir()
                .ok_or_else(|| Error::InvalidConfig("embedding.model_dir is required for the transformer embedder".into()))?;
            Ok(Box::new(TransformerEmbedder::load(&dir, settings.max_len)?))
        }
    }
}

/// Rebuild an embedder previously written with `Embedder::save`.
pub fn restore_embedder(dir: &Path) -> Result<Box<dyn Embedder>> {
    match descriptor::read_descriptor(dir)? {
        EmbedderDescriptor::Hashing { dim, max_len } => Ok(Box::new(HashingEmbedder::new(dim, max_len)?)),
        EmbedderDescriptor::Transformer { max_len } => Ok(Box::new(TransformerEmbedder::load(dir, max_len)?)),
    }
}
