//! LanceDB connection and table read helpers.

use anyhow::Result;
use arrow_array::{Array, RecordBatch, StringArray, UInt32Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, Table};
use std::path::Path;

use ragindex_core::error::Error;

use crate::schema::{ID_COLUMN, ROW_COLUMN};

pub async fn open_db(dir: &Path) -> Result<Connection> {
	Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	let col = batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::IndexStateMismatch(format!("dense result without a {name} column")))?;
	Ok(col)
}

pub(crate) fn row_column<'a>(batch: &'a RecordBatch) -> Result<&'a UInt32Array> {
	let col = batch.column_by_name(ROW_COLUMN).and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
		.ok_or_else(|| Error::IndexStateMismatch(format!("dense result without a {ROW_COLUMN} column")))?;
	Ok(col)
}

/// Chunk ids ordered by their stored row. Gaps and duplicate rows are rejected.
pub async fn read_row_ids(table: &Table) -> Result<Vec<String>> {
	let total = table.count_rows(None).await?;
	let mut slots: Vec<Option<String>> = vec![None; total];
	let mut stream = table.query().select(Select::columns(&[ID_COLUMN, ROW_COLUMN])).execute().await?;
	while let Some(batch) = stream.try_next().await? {
		let ids = string_column(&batch, ID_COLUMN)?;
		let rows = row_column(&batch)?;
		for i in 0..batch.num_rows() {
			if ids.is_null(i) || rows.is_null(i) {
				return Err(Error::IndexStateMismatch("dense row with null id or row".into()).into());
			}
			let row = rows.value(i) as usize;
			let slot = slots.get_mut(row)
				.ok_or_else(|| Error::IndexStateMismatch(format!("dense row {row} outside 0..{total}")))?;
			if slot.replace(ids.value(i).to_string()).is_some() {
				return Err(Error::IndexStateMismatch(format!("dense row {row} stored twice")).into());
			}
		}
	}
	let ids = slots.into_iter().enumerate()
		.map(|(row, id)| id.ok_or_else(|| Error::IndexStateMismatch(format!("dense row {row} missing"))))
		.collect::<Result<Vec<_>, Error>>()?;
	Ok(ids)
}
