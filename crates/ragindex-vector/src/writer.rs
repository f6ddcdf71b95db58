use anyhow::Result;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray, UInt32Array};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::info;

use ragindex_core::error::Error;
use ragindex_core::traits::{l2_normalize, Embedder};
use ragindex_core::types::Chunk;

use crate::schema::build_arrow_schema;

/// Embed `chunks` in batches of `batch_size` and turn each batch into a record
/// batch of `(id, row, vector)`, rows numbered from 0 in chunk order.
pub fn embed_chunks(chunks: &[Chunk], embedder: &dyn Embedder, batch_size: usize) -> Result<Vec<RecordBatch>> {
	let dim = embedder.dim();
	let batch_size = batch_size.max(1);
	info!("Embedding {} chunks with {} (dim {}, batch {})", chunks.len(), embedder.embedder_id(), dim, batch_size);
	let pb = ProgressBar::new(chunks.len() as u64);
	pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));

	let mut batches = Vec::with_capacity(chunks.len().div_ceil(batch_size));
	for (b, group) in chunks.chunks(batch_size).enumerate() {
		let first_row = b * batch_size;
		let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
		let mut vectors = embedder.embed_batch(&texts, true)?;
		check_vectors(&vectors, texts.len(), dim)?;
		// Re-normalize regardless of what the embedder promises.
		for v in &mut vectors { l2_normalize(v); }
		batches.push(to_record_batch(group, first_row, vectors, dim)?);
		pb.inc(group.len() as u64);
	}
	pb.finish_with_message("embedded");
	Ok(batches)
}

pub(crate) fn check_vectors(vectors: &[Vec<f32>], expected: usize, dim: usize) -> Result<(), Error> {
	if vectors.len() != expected {
		return Err(Error::EmbedderFailure(format!("embedder returned {} vectors for {} texts", vectors.len(), expected)));
	}
	if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
		return Err(Error::EmbedderFailure(format!("embedder returned a {}-dim vector, expected {dim}", bad.len())));
	}
	Ok(())
}

fn to_record_batch(chunks: &[Chunk], first_row: usize, vectors: Vec<Vec<f32>>, dim: usize) -> Result<RecordBatch> {
	let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
	let rows = (first_row..first_row + chunks.len()).map(u32::try_from).collect::<Result<Vec<_>, _>>()?;
	let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
	let record_batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(UInt32Array::from(rows)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
	])?;
	Ok(record_batch)
}
