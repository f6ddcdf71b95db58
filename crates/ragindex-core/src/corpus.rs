//! JSON Lines chunk corpus: one chunk object per line, line order = row order.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::types::Chunk;

pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for chunk in chunks {
        serde_json::to_writer(&mut out, chunk)?;
        out.write_all(b"\n")?;
    }
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut chunks = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line).map_err(|e| Error::Corpus { line: i + 1, message: e.to_string() })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Mean chunk length in characters, 0 for an empty corpus.
pub fn average_chars(chunks: &[Chunk]) -> usize {
    if chunks.is_empty() {
        return 0;
    }
    chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len()
}
