use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

/// Column layout of the hierarchy table. One row per stored document at any level.
pub fn build_hierarchy_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("doc_type", DataType::Utf8, false),
		Field::new("repo_id", DataType::Utf8, false),
		Field::new("path", DataType::Utf8, true),
		Field::new("symbol", DataType::Utf8, true),
		Field::new("content", DataType::Utf8, false),
		Field::new("parent_id", DataType::Utf8, true),
		Field::new("children_json", DataType::Utf8, false),
		Field::new("line_start", DataType::Int32, true),
		Field::new("line_end", DataType::Int32, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
