use anyhow::{Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use arrow_array::{RecordBatch, RecordBatchIterator, Int32Array, FixedSizeListArray, StringArray};
use std::sync::Arc;
use tracing::info;

use repoqa_core::Document;
use crate::schema::build_hierarchy_schema;
use crate::table::ensure_hierarchy_table;

const BATCH_SIZE: usize = 1000;

/// Bulk loader for pre-indexed hierarchy documents. Rows are upserted by `id`.
pub struct HierarchyWriter { db: Connection, table_name: String, dim: i32 }

impl HierarchyWriter {
	pub fn new(db: Connection, table_name: &str, dim: usize) -> Result<Self> {
		let dim = i32::try_from(dim).map_err(|_| anyhow!("embedding dim {} out of range", dim))?;
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	pub async fn write(&self, docs: &[Document]) -> Result<usize> {
		if docs.is_empty() { info!("no documents to write"); return Ok(0); }
		if let Some(bad) = docs.iter().find(|d| d.vector.len() != self.dim as usize) {
			return Err(anyhow!("document {} has {} dims, table expects {}", bad.id, bad.vector.len(), self.dim));
		}
		if let Some(bad) = docs.iter().find(|d| d.line_range.is_some_and(|r| line_column(r.start).is_err() || line_column(r.end).is_err())) {
			return Err(anyhow!("document {} has a line range beyond {}", bad.id, i32::MAX));
		}
		ensure_hierarchy_table(&self.db, &self.table_name, self.dim).await?;
		info!(count = docs.len(), table = %self.table_name, "writing hierarchy documents");
		let pb = ProgressBar::new(docs.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%)")?.progress_chars("#>-"));
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut written = 0usize;
		for batch in docs.chunks(BATCH_SIZE) {
			let record_batch = self.docs_to_record_batch(batch)?;
			let schema = record_batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
			let mut mi = table.merge_insert(&["id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
			written += batch.len();
			pb.set_position(written as u64);
		}
		pb.finish_and_clear();
		info!(written, table = %self.table_name, "hierarchy write complete");
		Ok(written)
	}

	fn docs_to_record_batch(&self, docs: &[Document]) -> Result<RecordBatch> {
		let schema = build_hierarchy_schema(self.dim);
		let mut ids = Vec::new(); let mut doc_types = Vec::new(); let mut repo_ids = Vec::new();
		let mut paths = Vec::new(); let mut symbols = Vec::new(); let mut contents = Vec::new();
		let mut parents = Vec::new(); let mut children = Vec::new();
		let mut line_starts = Vec::new(); let mut line_ends = Vec::new();
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for doc in docs {
			ids.push(doc.id.clone());
			doc_types.push(doc.level.doc_type());
			repo_ids.push(doc.repo_id.clone());
			paths.push(doc.path.clone());
			symbols.push(doc.symbol.clone());
			contents.push(doc.content.clone());
			parents.push(doc.parent_id.clone());
			children.push(serde_json::to_string(&doc.children_ids)?);
			line_starts.push(doc.line_range.map(|r| line_column(r.start)).transpose()?);
			line_ends.push(doc.line_range.map(|r| line_column(r.end)).transpose()?);
			vectors.push(Some(doc.vector.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_types)),
			Arc::new(StringArray::from(repo_ids)),
			Arc::new(StringArray::from(paths)),
			Arc::new(StringArray::from(symbols)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(parents)),
			Arc::new(StringArray::from(children)),
			Arc::new(Int32Array::from(line_starts)),
			Arc::new(Int32Array::from(line_ends)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim)),
		])?;
		Ok(record_batch)
	}
}

/// Line numbers are stored as Int32.
fn line_column(line: u32) -> Result<i32> {
	i32::try_from(line).map_err(|_| anyhow!("line {} does not fit the Int32 line column", line))
}
