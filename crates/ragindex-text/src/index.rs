use anyhow::Result;
use std::path::Path;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, QueryParser};
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument};
use tracing::{debug, info, warn};

use ragindex_core::error::Error;
use ragindex_core::types::{Chunk, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, ID_FIELD, ROW_FIELD, TEXT_FIELD};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// BM25 index over chunk text.
///
/// Every document stores its chunk id and its row in the corpus it was built
/// from; `ids()` lists them in row order so callers can verify alignment with
/// a chunk list before serving queries.
pub struct LexicalIndex {
	index: Index,
	reader: IndexReader,
	row_field: Field,
	text_field: Field,
	ids: Vec<String>,
}

impl LexicalIndex {
	/// Build a fresh on-disk index, replacing anything already in `index_dir`.
	pub fn build(chunks: &[Chunk], index_dir: &Path) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, build_schema())?;
		Self::populate(index, chunks)
	}

	pub fn build_in_ram(chunks: &[Chunk]) -> Result<Self> {
		Self::populate(Index::create_in_ram(build_schema()), chunks)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir)?;
		Self::from_index(index)
	}

	fn populate(index: Index, chunks: &[Chunk]) -> Result<Self> {
		register_tokenizer(&index);
		if chunks.is_empty() { warn!("Building lexical index over an empty corpus"); }
		let schema = index.schema();
		let id_field = schema.get_field(ID_FIELD)?;
		let row_field = schema.get_field(ROW_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		// One indexing thread keeps doc ids in corpus order within a single segment.
		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
		for (row, c) in chunks.iter().enumerate() {
			index_writer.add_document(doc!(
				id_field => c.id.clone(),
				row_field => row as u64,
				text_field => c.text.clone(),
			))?;
		}
		index_writer.commit()?;
		index_writer.wait_merging_threads()?;
		info!("Lexical index built over {} chunks", chunks.len());
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let id_field = schema.get_field(ID_FIELD)?;
		let row_field = schema.get_field(ROW_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let ids = read_row_ids(&reader.searcher(), id_field, row_field)?;
		Ok(Self { index, reader, row_field, text_field, ids })
	}

	pub fn len(&self) -> usize { self.ids.len() }

	pub fn is_empty(&self) -> bool { self.ids.is_empty() }

	/// Chunk ids in row order.
	pub fn ids(&self) -> &[String] { &self.ids }

	/// Top `min(k, len)` chunks by BM25.
	///
	/// Chunks the query does not match follow all matching chunks with score 0,
	/// in row order. Malformed query syntax is parsed leniently.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let limit = k.min(self.ids.len());
		if limit == 0 { return Ok(vec![]); }
		let searcher = self.reader.searcher();
		let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (parsed, errors) = query_parser.parse_query_lenient(query);
		if !errors.is_empty() { debug!("Lenient parse of {:?} dropped {} fragment(s)", query, errors.len()); }
		let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;

		let mut seen = vec![false; self.ids.len()];
		let mut hits = Vec::with_capacity(limit);
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let row = stored_row(&doc, self.row_field)?;
			let id = self.ids.get(row).cloned().ok_or_else(|| Error::IndexStateMismatch(format!("lexical hit row {row} outside corpus")))?;
			seen[row] = true;
			hits.push(SearchHit { id, row, score, source: SourceKind::Lexical });
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
		debug!("Lexical query {:?}: {} matching of {} requested", query, hits.len(), limit);

		for (row, id) in self.ids.iter().enumerate() {
			if hits.len() >= limit { break; }
			if !seen[row] {
				hits.push(SearchHit { id: id.clone(), row, score: 0.0, source: SourceKind::Lexical });
			}
		}
		Ok(hits)
	}
}

fn stored_row(doc: &TantivyDocument, row_field: Field) -> Result<usize> {
	let row = doc.get_first(row_field).and_then(|v| v.as_u64())
		.ok_or_else(|| Error::IndexStateMismatch("lexical document without a row".to_string()))?;
	Ok(usize::try_from(row)?)
}

/// Collect `(row, id)` for every document and return ids ordered by row,
/// rejecting gaps and duplicates.
fn read_row_ids(searcher: &Searcher, id_field: Field, row_field: Field) -> Result<Vec<String>> {
	let addrs = searcher.search(&AllQuery, &DocSetCollector)?;
	let mut slots: Vec<Option<String>> = vec![None; addrs.len()];
	for addr in addrs {
		let doc: TantivyDocument = searcher.doc(addr)?;
		let row = stored_row(&doc, row_field)?;
		let id = doc.get_first(id_field).and_then(|v| v.as_str())
			.ok_or_else(|| Error::IndexStateMismatch(format!("lexical row {row} has no chunk id")))?;
		let slot = slots.get_mut(row)
			.ok_or_else(|| Error::IndexStateMismatch(format!("lexical row {row} outside 0..{}", searcher.num_docs())))?;
		if slot.replace(id.to_string()).is_some() {
			return Err(Error::IndexStateMismatch(format!("lexical row {row} stored twice")).into());
		}
	}
	let ids = slots.into_iter().enumerate()
		.map(|(row, id)| id.ok_or_else(|| Error::IndexStateMismatch(format!("lexical row {row} missing"))))
		.collect::<Result<Vec<_>, Error>>()?;
	Ok(ids)
}
