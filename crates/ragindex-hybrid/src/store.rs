use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ragindex_core::corpus::{read_chunks, write_chunks};
use ragindex_core::error::Error;
use ragindex_core::traits::Embedder;
use ragindex_core::types::Chunk;
use ragindex_embed::restore_embedder;
use ragindex_text::{tokenizer_fingerprint, LexicalIndex};
use ragindex_vector::DenseIndex;

pub const LEXICAL_DIR: &str = "lexical";
pub const DENSE_DIR: &str = "dense";
pub const EMBEDDER_DIR: &str = "embedder";
pub const CHUNKS_FILE: &str = "chunks.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

/// Record of one persisted generation. Written last; its presence marks a
/// complete directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub chunk_count: usize,
    pub embedder_id: String,
    pub dim: usize,
    pub lexical_fingerprint: String,
    /// Digest of chunk ids, texts and the two fingerprints.
    pub generation: String,
    pub created_at: DateTime<Utc>,
}

/// Everything a `RetrievalService` is built from.
pub struct Generation {
    pub manifest: Manifest,
    pub chunks: Vec<Chunk>,
    pub lexical: LexicalIndex,
    pub dense: DenseIndex,
    pub embedder: Box<dyn Embedder>,
}

/// Scratch directory beside the store root. Indexes are built into it and
/// `IndexStore::save` promotes it by rename.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn path(&self) -> &Path { &self.dir }
    pub fn lexical_dir(&self) -> PathBuf { self.dir.join(LEXICAL_DIR) }
    pub fn dense_dir(&self) -> PathBuf { self.dir.join(DENSE_DIR) }
    pub fn embedder_dir(&self) -> PathBuf { self.dir.join(EMBEDDER_DIR) }

    /// Drop the staging directory without promoting it.
    pub fn discard(self) -> Result<()> {
        if self.dir.exists() { std::fs::remove_dir_all(&self.dir)?; }
        Ok(())
    }
}

/// One index generation on disk under `root`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "index".into());
        name.push(suffix);
        self.root.with_file_name(name)
    }

    /// Fresh, empty staging directory. Leftovers from an interrupted build are removed.
    pub fn staging(&self) -> Result<StagingArea> {
        let dir = self.sibling(".staging");
        if dir.exists() {
            warn!("Removing stale staging directory {}", dir.display());
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        Ok(StagingArea { dir })
    }

    /// Persist a generation whose indexes were built inside `staging`, then
    /// swap it in for whatever `root` held before. On failure the staging
    /// directory is removed.
    pub fn save(&self, staging: StagingArea, lexical: LexicalIndex, dense: DenseIndex, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Manifest> {
        let checked = verify_staged(&staging, &lexical, &dense, embedder, chunks);
        drop(lexical);
        drop(dense);
        let written = checked.and_then(|()| write_staged(&staging, embedder, chunks));
        let manifest = match written {
            Ok(manifest) => manifest,
            Err(e) => {
                discard_quietly(staging);
                return Err(e);
            }
        };
        self.promote(staging)?;
        info!("Saved generation {} ({} chunks) to {}", manifest.generation, manifest.chunk_count, self.root.display());
        Ok(manifest)
    }

    fn promote(&self, staging: StagingArea) -> Result<()> {
        let old = self.sibling(".old");
        if old.exists() { std::fs::remove_dir_all(&old)?; }
        let had_previous = self.root.exists();
        if had_previous { std::fs::rename(&self.root, &old)?; }
        if let Err(e) = std::fs::rename(staging.path(), &self.root) {
            if had_previous { std::fs::rename(&old, &self.root)?; }
            return Err(e.into());
        }
        if had_previous { std::fs::remove_dir_all(&old)?; }
        Ok(())
    }

    /// Load and cross-check every artifact of the stored generation.
    pub async fn load(&self) -> Result<Generation> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        let required = [
            ("manifest", manifest_path.clone()),
            ("lexical index", self.root.join(LEXICAL_DIR)),
            ("dense index", self.root.join(DENSE_DIR)),
            ("embedder", self.root.join(EMBEDDER_DIR)),
            ("chunk list", self.root.join(CHUNKS_FILE)),
        ];
        for (artifact, path) in required {
            if !path.exists() { return Err(Error::MissingArtifact { artifact, path }.into()); }
        }

        let manifest: Manifest = serde_json::from_slice(&std::fs::read(&manifest_path)?)
            .map_err(|e| Error::IndexStateMismatch(format!("unreadable manifest {}: {e}", manifest_path.display())))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::IndexStateMismatch(format!("manifest format {} (expected {FORMAT_VERSION})", manifest.format_version)).into());
        }
        let fingerprint = tokenizer_fingerprint();
        if manifest.lexical_fingerprint != fingerprint {
            return Err(Error::FingerprintMismatch { component: "lexical analyzer", expected: manifest.lexical_fingerprint, found: fingerprint }.into());
        }

        let chunks = read_chunks(&self.root.join(CHUNKS_FILE))?;
        if chunks.len() != manifest.chunk_count {
            return Err(Error::IndexStateMismatch(format!("manifest lists {} chunks, chunk list has {}", manifest.chunk_count, chunks.len())).into());
        }
        let embedder = restore_embedder(&self.root.join(EMBEDDER_DIR))?;
        if embedder.embedder_id() != manifest.embedder_id {
            return Err(Error::FingerprintMismatch { component: "embedder", expected: manifest.embedder_id, found: embedder.embedder_id().to_string() }.into());
        }

        let lexical = LexicalIndex::open(&self.root.join(LEXICAL_DIR))?;
        let dense = DenseIndex::open(&self.root.join(DENSE_DIR)).await?;
        check_alignment(&chunks, lexical.ids(), "lexical")?;
        check_alignment(&chunks, dense.ids(), "dense")?;
        if dense.dim() != embedder.dim() {
            return Err(Error::IndexStateMismatch(format!("dense index has dim {}, embedder has {}", dense.dim(), embedder.dim())).into());
        }
        info!("Loaded generation {} ({} chunks) from {}", manifest.generation, chunks.len(), self.root.display());
        Ok(Generation { manifest, chunks, lexical, dense, embedder })
    }
}

/// Build both indexes over `chunks` in a staging area and save them as the new generation.
pub async fn build_generation(store: &IndexStore, chunks: &[Chunk], embedder: &dyn Embedder, batch_size: usize) -> Result<Manifest> {
    let staging = store.staging()?;
    let built = async {
        let lexical = LexicalIndex::build(chunks, &staging.lexical_dir())?;
        let dense = DenseIndex::build(chunks, embedder, &staging.dense_dir(), batch_size).await?;
        Ok::<_, anyhow::Error>((lexical, dense))
    }.await;
    match built {
        Ok((lexical, dense)) => store.save(staging, lexical, dense, embedder, chunks),
        Err(e) => {
            discard_quietly(staging);
            Err(e)
        }
    }
}

fn discard_quietly(staging: StagingArea) {
    if let Err(cleanup) = staging.discard() { warn!("Could not remove staging directory: {cleanup}"); }
}

fn verify_staged(staging: &StagingArea, lexical: &LexicalIndex, dense: &DenseIndex, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<()> {
    for (artifact, path) in [("lexical index", staging.lexical_dir()), ("dense index", staging.dense_dir())] {
        if !path.is_dir() { return Err(Error::MissingArtifact { artifact, path }.into()); }
    }
    check_alignment(chunks, lexical.ids(), "lexical")?;
    check_alignment(chunks, dense.ids(), "dense")?;
    if dense.dim() != embedder.dim() {
        return Err(Error::IndexStateMismatch(format!("dense index has dim {}, embedder {} has {}", dense.dim(), embedder.embedder_id(), embedder.dim())).into());
    }
    Ok(())
}

/// Embedder, chunk list, then the manifest.
fn write_staged(staging: &StagingArea, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Manifest> {
    embedder.save(&staging.embedder_dir())?;
    write_chunks(&staging.path().join(CHUNKS_FILE), chunks)?;
    let lexical_fingerprint = tokenizer_fingerprint();
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        chunk_count: chunks.len(),
        embedder_id: embedder.embedder_id().to_string(),
        dim: embedder.dim(),
        generation: generation_digest(chunks, embedder.embedder_id(), &lexical_fingerprint),
        lexical_fingerprint,
        created_at: Utc::now(),
    };
    std::fs::write(staging.path().join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;
    Ok(manifest)
}

/// Index ids must equal the chunk list ids, row for row.
pub(crate) fn check_alignment(chunks: &[Chunk], ids: &[String], index: &str) -> Result<(), Error> {
    if chunks.len() != ids.len() {
        return Err(Error::IndexStateMismatch(format!("{index} index holds {} chunks, chunk list has {}", ids.len(), chunks.len())));
    }
    if let Some(row) = chunks.iter().zip(ids).position(|(c, id)| c.id != *id) {
        return Err(Error::IndexStateMismatch(format!("{index} row {row} is {:?}, chunk list has {:?}", ids[row], chunks[row].id)));
    }
    Ok(())
}

fn generation_digest(chunks: &[Chunk], embedder_id: &str, lexical_fingerprint: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(embedder_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(lexical_fingerprint.as_bytes());
    for c in chunks {
        hasher.update(&[0]);
        hasher.update(c.id.as_bytes());
        hasher.update(&[0]);
        hasher.update(c.text.as_bytes());
    }
    hasher.finalize().to_hex()[..16].to_string()
}
