use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_DIM: i32 = 384;

pub fn build_chunks_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("source_id", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("start_offset", DataType::Float64, false),
		Field::new("end_offset", DataType::Float64, false),
		Field::new("indexed_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
