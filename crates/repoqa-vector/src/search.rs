use anyhow::{Result, anyhow};
use async_trait::async_trait;
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::debug;

use repoqa_core::{Document, DocumentStore, Error, Level, LineRange, ScoredId, SearchBackend};
use crate::table::sql_literal;

/// LanceDB-backed hierarchy: one table holding every level, filtered by `doc_type`.
pub struct LanceHierarchyStore { db: Connection, table_name: String }

impl LanceHierarchyStore {
	pub fn new(db: Connection, table_name: &str) -> Self {
		Self { db, table_name: table_name.to_string() }
	}

	async fn table(&self) -> Result<Table> {
		Ok(self.db.open_table(&self.table_name).execute().await?)
	}

	async fn search_level(&self, query_vec: &[f32], level: Level, repo_filter: Option<&str>, k: usize) -> Result<Vec<ScoredId>> {
		let table = self.table().await?;
		let mut filter = format!("doc_type = {}", sql_literal(level.doc_type()));
		if let Some(repo) = repo_filter {
			filter.push_str(&format!(" AND repo_id = {}", sql_literal(repo)));
		}
		let mut stream = table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::Cosine)
			.only_if(filter)
			.limit(k)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = string_column(&batch, "id")?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
			for i in 0..batch.num_rows() {
				// cosine distance is 1 - similarity
				let score = distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
				hits.push(ScoredId { id: ids.value(i).to_string(), score });
			}
		}
		debug!(level = %level, hits = hits.len(), "lance level search");
		Ok(hits)
	}

	async fn fetch(&self, id: &str) -> Result<Option<Document>> {
		let table = self.table().await?;
		let mut stream = table.query().only_if(format!("id = {}", sql_literal(id))).limit(1).execute().await?;
		while let Some(batch) = stream.try_next().await? {
			if batch.num_rows() > 0 {
				return row_to_document(&batch, 0).map(Some);
			}
		}
		Ok(None)
	}
}

#[async_trait]
impl SearchBackend for LanceHierarchyStore {
	async fn search(&self, query_vec: &[f32], level: Level, repo_filter: Option<&str>, k: usize) -> repoqa_core::Result<Vec<ScoredId>> {
		self.search_level(query_vec, level, repo_filter, k).await.map_err(|e| Error::Search(e.to_string()))
	}
}

#[async_trait]
impl DocumentStore for LanceHierarchyStore {
	async fn get(&self, id: &str) -> repoqa_core::Result<Option<Document>> {
		self.fetch(id).await.map_err(|e| Error::Store(e.to_string()))
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("missing {} column", name))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("missing {} column", name))
}

fn optional_string(col: &StringArray, i: usize) -> Option<String> {
	if col.is_null(i) { None } else { Some(col.value(i).to_string()) }
}

fn row_to_document(batch: &RecordBatch, i: usize) -> Result<Document> {
	let doc_type = string_column(batch, "doc_type")?.value(i);
	let level = Level::from_doc_type(doc_type).ok_or_else(|| anyhow!("unknown doc_type {}", doc_type))?;
	let children_json = string_column(batch, "children_json")?.value(i);
	let starts = int_column(batch, "line_start")?;
	let ends = int_column(batch, "line_end")?;
	let line_range = if starts.is_null(i) || ends.is_null(i) {
		None
	} else {
		Some(LineRange { start: u32::try_from(starts.value(i))?, end: u32::try_from(ends.value(i))? })
	};
	Ok(Document {
		id: string_column(batch, "id")?.value(i).to_string(),
		level,
		repo_id: string_column(batch, "repo_id")?.value(i).to_string(),
		path: optional_string(string_column(batch, "path")?, i),
		symbol: optional_string(string_column(batch, "symbol")?, i),
		content: string_column(batch, "content")?.value(i).to_string(),
		parent_id: optional_string(string_column(batch, "parent_id")?, i),
		children_ids: serde_json::from_str(children_json)?,
		line_range,
		vector: Vec::new(),
	})
}
