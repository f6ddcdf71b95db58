use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunker::{char_len, Chunker};
use crate::config::ChunkingSettings;
use crate::types::{Chunk, ChunkStrategy, Document};

/// Header lines are only recognised within the first few lines of a file.
const HEADER_LINES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    chunker: Chunker,
}

impl DataProcessor {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        Ok(Self { chunker: Chunker::new(settings)? })
    }

    /// Read every `.txt` file under `data_dir` (sorted by path) as a document.
    pub fn load_documents(&self, data_dir: &Path) -> Result<Vec<Document>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!("No .txt files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        let min_body = self.chunker.settings().min_document_chars;
        let mut docs = Vec::new();
        for file_path in &files {
            let content = self.read_file_content(file_path)?;
            let doc = parse_document(&content, &self.extract_title(file_path));
            if char_len(&doc.body) > min_body {
                docs.push(doc);
            } else {
                debug!("Skipping {}: body too short", file_path.display());
            }
        }
        info!("Loaded {} documents from {} files", docs.len(), files.len());
        Ok(docs)
    }

    /// Segment every document and assign dense, deterministic ids.
    ///
    /// Ids are `<strategy>_<seq:06>` where the sequence counts retained chunks
    /// across all documents in input order, so identical input always yields
    /// identical ids and dropped fragments leave no gaps.
    pub fn chunk_documents(&self, docs: &[Document], strategy: ChunkStrategy) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in docs {
            for text in self.chunker.segment(&doc.body, strategy) {
                if !self.chunker.is_retrievable(&text) {
                    continue;
                }
                chunks.push(Chunk {
                    id: format!("{}_{:06}", strategy, chunks.len()),
                    source: doc.source.clone(),
                    title: doc.title.clone(),
                    text,
                    strategy,
                });
            }
        }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_title(&self, file_path: &Path) -> String {
        file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") {
                txt_files.push(path.to_path_buf());
            }
        }
        txt_files.sort();
        txt_files
    }
}

/// Split an optional `SOURCE: ` / `TITLE: ` header from the body.
///
/// The body starts after the last header line found in the first
/// [`HEADER_LINES`] lines.
pub fn parse_document(content: &str, default_title: &str) -> Document {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut source = String::new();
    let mut title = default_title.to_string();
    let mut body_start = 0;
    for (i, line) in lines.iter().take(HEADER_LINES).enumerate() {
        if let Some(rest) = line.strip_prefix("SOURCE: ") {
            source = rest.trim().to_string();
            body_start = i + 1;
        } else if let Some(rest) = line.strip_prefix("TITLE: ") {
            title = rest.trim().to_string();
            body_start = i + 1;
        }
    }
    let body = lines[body_start..].join("\n").trim().to_string();
    Document { source, title, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lines_are_split_from_body() {
        let doc = parse_document("SOURCE: https://example.org/a\nTITLE: Example\n\nBody text here.\n", "a");
        assert_eq!(doc.source, "https://example.org/a");
        assert_eq!(doc.title, "Example");
        assert_eq!(doc.body, "Body text here.");
    }

    #[test]
    fn missing_header_uses_file_stem_and_whole_body() {
        let doc = parse_document("Just a body.\nSecond line.", "stem");
        assert_eq!(doc.source, "");
        assert_eq!(doc.title, "stem");
        assert_eq!(doc.body, "Just a body.\nSecond line.");
    }

    #[test]
    fn ids_are_dense_after_filtering() {
        let processor = DataProcessor::default();
        let long = "Pittsburgh sits where the Allegheny and Monongahela rivers join to form the Ohio River, a spot long valued for trade.";
        let docs = vec![
            Document { source: "s1".into(), title: "t1".into(), body: format!("{long} Short bit here ok.") },
            Document { source: "s2".into(), title: "t2".into(), body: "Too short to index at all.".into() },
            Document { source: "s3".into(), title: "t3".into(), body: long.to_string() },
        ];
        let chunks = processor.chunk_documents(&docs, ChunkStrategy::Sentence);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["sentence_000000", "sentence_000001"]);
        assert_eq!(chunks[1].source, "s3");
        assert!(chunks.iter().all(|c| char_len(&c.text) > 100));
    }
}
