//! LanceDB-backed chunk store.
//!
//! One table holds every chunk with its embedding. Queries run with cosine
//! distance (`1 - cos`, 0..2) and push the source filter down as an
//! `only_if` predicate so the limit applies after filtering.
use anyhow::{anyhow, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Float64Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use retrieval_core::traits::{VectorStore, VectorWriter};
use retrieval_core::types::{Chunk, NeighborRow};

use crate::schema::build_chunks_schema;

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn f64_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

pub struct LanceVectorStore {
    db: Connection,
    table_name: String,
    dim: i32,
}

impl LanceVectorStore {
    pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        let dim = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {dim} too large"))?;
        let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
        let store = Self { db, table_name: table_name.to_string(), dim };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            return Ok(());
        }
        let schema = build_chunks_schema(self.dim);
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        self.db.create_table(&self.table_name, Box::new(iter)).execute().await?;
        info!(table = %self.table_name, dim = self.dim, "created lance chunk table");
        Ok(())
    }

    async fn table(&self) -> Result<Table> {
        Ok(self.db.open_table(&self.table_name).execute().await?)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.table().await?.count_rows(None).await?)
    }

    fn chunks_to_record_batch(&self, chunks: &[Chunk]) -> Result<RecordBatch> {
        let schema = build_chunks_schema(self.dim);
        let now = Utc::now().timestamp_millis();
        let mut ids = Vec::new(); let mut source_ids = Vec::new(); let mut texts = Vec::new();
        let mut starts = Vec::new(); let mut ends = Vec::new(); let mut indexed_at = Vec::new();
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for c in chunks {
            let embedding = c.embedding.as_ref().ok_or_else(|| anyhow!("chunk '{}' has no embedding", c.id))?;
            if embedding.len() != self.dim as usize {
                return Err(anyhow!("chunk '{}' has {} dims, table expects {}", c.id, embedding.len(), self.dim));
            }
            ids.push(c.id.clone()); source_ids.push(c.source_id.clone()); texts.push(c.text.clone());
            starts.push(c.start_offset); ends.push(c.end_offset); indexed_at.push(now);
            vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
        }
        let record_batch = RecordBatch::try_new(schema, vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(source_ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(Float64Array::from(starts)),
            Arc::new(Float64Array::from(ends)),
            Arc::new(TimestampMillisecondArray::from(indexed_at)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim)),
        ])?;
        Ok(record_batch)
    }

    fn rows_from_batch(batch: &RecordBatch, out: &mut Vec<NeighborRow>) -> Result<()> {
        let ids = string_col(batch, "id")?;
        let sources = string_col(batch, "source_id")?;
        let texts = string_col(batch, "text")?;
        let starts = f64_col(batch, "start_offset")?;
        let ends = f64_col(batch, "end_offset")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow!("_distance column missing"))?;
        for i in 0..batch.num_rows() {
            out.push(NeighborRow {
                chunk_id: ids.value(i).to_string(),
                source_id: sources.value(i).to_string(),
                text: texts.value(i).to_string(),
                start_offset: starts.value(i),
                end_offset: ends.value(i),
                distance: if distances.is_null(i) { 2.0 } else { distances.value(i) },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn nearest_neighbors(&self, vector: &[f32], top_k: usize, source_filter: Option<&str>) -> Result<Vec<NeighborRow>> {
        let table = self.table().await?;
        let mut query = table.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(top_k);
        if let Some(source_id) = source_filter {
            query = query.only_if(format!("source_id = {}", quote(source_id)));
        }
        let mut stream = query.execute().await?;
        let mut rows = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            Self::rows_from_batch(&batch, &mut rows)?;
        }
        rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        rows.truncate(top_k);
        debug!(rows = rows.len(), table = %self.table_name, "lance nearest neighbors");
        Ok(rows)
    }
}

#[async_trait]
impl VectorWriter for LanceVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() { return Ok(0); }
        let record_batch = self.chunks_to_record_batch(chunks)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        let table = self.table().await?;
        // Upsert via merge_insert: id is unique
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        info!(chunks = chunks.len(), table = %self.table_name, "upserted chunks");
        Ok(chunks.len())
    }

    async fn delete_source(&self, source_id: &str) -> Result<usize> {
        let table = self.table().await?;
        let predicate = format!("source_id = {}", quote(source_id));
        let matching = table.count_rows(Some(predicate.clone())).await?;
        if matching > 0 {
            table.delete(&predicate).await?;
        }
        Ok(matching)
    }

    async fn delete_chunk(&self, chunk_id: &str) -> Result<bool> {
        let table = self.table().await?;
        let predicate = format!("id = {}", quote(chunk_id));
        let matching = table.count_rows(Some(predicate.clone())).await?;
        if matching > 0 {
            table.delete(&predicate).await?;
        }
        Ok(matching > 0)
    }
}
