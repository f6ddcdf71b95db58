use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use ragindex_core::error::Error;

pub const DESCRIPTOR_FILE: &str = "embedder.json";

/// What `restore_embedder` needs to rebuild a saved embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbedderDescriptor {
    Hashing { dim: usize, max_len: usize },
    /// Model files live next to the descriptor.
    Transformer { max_len: usize },
}

pub fn write_descriptor(dir: &Path, descriptor: &EmbedderDescriptor) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(DESCRIPTOR_FILE), serde_json::to_vec_pretty(descriptor)?)?;
    Ok(())
}

pub fn read_descriptor(dir: &Path) -> Result<EmbedderDescriptor> {
    let path = dir.join(DESCRIPTOR_FILE);
    if !path.is_file() {
        return Err(Error::MissingArtifact { artifact: "embedder descriptor", path }.into());
    }
    let descriptor = serde_json::from_slice(&std::fs::read(&path)?)
        .map_err(|e| Error::EmbedderFailure(format!("unreadable {}: {e}", path.display())))?;
    Ok(descriptor)
}
