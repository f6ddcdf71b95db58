use anyhow::Result;
use arrow_array::{Array, Float32Array, RecordBatchIterator};
use arrow_schema::ArrowError;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tracing::{debug, info, warn};

use ragindex_core::error::Error;
use ragindex_core::traits::{l2_normalize, Embedder};
use ragindex_core::types::{Chunk, SearchHit, SourceKind};

use crate::schema::{build_arrow_schema, vector_dim, DISTANCE_COLUMN, ID_COLUMN, ROW_COLUMN, TABLE_NAME};
use crate::table::{open_db, read_row_ids, row_column, string_column};
use crate::writer::{check_vectors, embed_chunks};

/// Flat cosine search over one unit-length vector per chunk, stored in a
/// LanceDB table together with the chunk id and row.
pub struct DenseIndex {
	table: Table,
	dim: usize,
	ids: Vec<String>,
}

impl DenseIndex {
	/// Embed `chunks` and write a fresh database at `dir`, replacing anything there.
	pub async fn build(chunks: &[Chunk], embedder: &dyn Embedder, dir: &Path, batch_size: usize) -> Result<Self> {
		if dir.exists() { std::fs::remove_dir_all(dir)?; }
		std::fs::create_dir_all(dir)?;
		let dim = embedder.dim();
		let schema = build_arrow_schema(dim);
		let db = open_db(dir).await?;
		let table = if chunks.is_empty() {
			warn!("Building dense index over an empty corpus");
			db.create_empty_table(TABLE_NAME, schema).execute().await?
		} else {
			let batches: Vec<Result<_, ArrowError>> = embed_chunks(chunks, embedder, batch_size)?.into_iter().map(Ok).collect();
			let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
			db.create_table(TABLE_NAME, reader).execute().await?
		};
		info!("Dense index built over {} chunks at {}", chunks.len(), dir.display());
		Self::from_table(table).await
	}

	pub async fn open(dir: &Path) -> Result<Self> {
		let db = open_db(dir).await?;
		let table = db.open_table(TABLE_NAME).execute().await?;
		Self::from_table(table).await
	}

	async fn from_table(table: Table) -> Result<Self> {
		let schema = table.schema().await?;
		let dim = vector_dim(&schema)
			.ok_or_else(|| Error::IndexStateMismatch(format!("dense table {TABLE_NAME} has no fixed-size vector column")))?;
		let ids = read_row_ids(&table).await?;
		Ok(Self { table, dim, ids })
	}

	pub fn len(&self) -> usize { self.ids.len() }

	pub fn is_empty(&self) -> bool { self.ids.is_empty() }

	pub fn dim(&self) -> usize { self.dim }

	/// Chunk ids in row order.
	pub fn ids(&self) -> &[String] { &self.ids }

	/// Embed `query` and return the `min(k, len)` most similar chunks.
	pub async fn search(&self, query: &str, embedder: &dyn Embedder, k: usize) -> Result<Vec<SearchHit>> {
		if k.min(self.ids.len()) == 0 { return Ok(vec![]); }
		let mut vectors = embedder.embed_batch(&[query.to_string()], true)?;
		check_vectors(&vectors, 1, self.dim)?;
		let vector = vectors.swap_remove(0);
		self.search_vector(vector, k).await
	}

	/// Nearest rows to `vector` by cosine similarity, descending, ties by row.
	pub async fn search_vector(&self, mut vector: Vec<f32>, k: usize) -> Result<Vec<SearchHit>> {
		let limit = k.min(self.ids.len());
		if limit == 0 { return Ok(vec![]); }
		if vector.len() != self.dim {
			return Err(Error::EmbedderFailure(format!("query vector has dim {}, index expects {}", vector.len(), self.dim)).into());
		}
		l2_normalize(&mut vector);
		if vector.iter().all(|x| *x == 0.0) {
			debug!("Zero query vector; returning the first {limit} rows");
			return Ok(self.ids.iter().take(limit).enumerate()
				.map(|(row, id)| SearchHit { id: id.clone(), row, score: 0.0, source: SourceKind::Dense })
				.collect());
		}

		let mut hits = self.nearest(vector.clone(), limit).await?;
		if (hits.len() < limit || hits.iter().any(|h| !h.score.is_finite())) && limit < self.ids.len() {
			// Zero-vector rows have no cosine distance and may have taken real slots.
			debug!("Non-finite dense distances; rescanning all {} rows", self.ids.len());
			hits = self.nearest(vector, self.ids.len()).await?;
		}
		for hit in &mut hits {
			if !hit.score.is_finite() { hit.score = 0.0; }
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
		hits.truncate(limit);

		if hits.len() < limit {
			let mut seen = vec![false; self.ids.len()];
			for hit in &hits {
				if let Some(slot) = seen.get_mut(hit.row) { *slot = true; }
			}
			for (row, id) in self.ids.iter().enumerate() {
				if hits.len() >= limit { break; }
				if !seen[row] {
					hits.push(SearchHit { id: id.clone(), row, score: 0.0, source: SourceKind::Dense });
				}
			}
		}
		debug!("Dense search: {} hits of {} requested", hits.len(), limit);
		Ok(hits)
	}

	/// Raw LanceDB top-`limit` rows; scores may be NaN for zero-vector rows.
	async fn nearest(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
		let mut stream = self.table.vector_search(vector)?
			.distance_type(DistanceType::Cosine)
			.limit(limit)
			.select(Select::columns(&[ID_COLUMN, ROW_COLUMN]))
			.execute().await?;
		let mut hits = Vec::with_capacity(limit);
		while let Some(batch) = stream.try_next().await? {
			let ids = string_column(&batch, ID_COLUMN)?;
			let rows = row_column(&batch)?;
			let distances = batch.column_by_name(DISTANCE_COLUMN).and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| Error::IndexStateMismatch("dense result without distances".into()))?;
			for i in 0..batch.num_rows() {
				let score = if distances.is_null(i) { f32::NAN } else { 1.0 - distances.value(i) };
				hits.push(SearchHit { id: ids.value(i).to_string(), row: rows.value(i) as usize, score, source: SourceKind::Dense });
			}
		}
		Ok(hits)
	}
}
