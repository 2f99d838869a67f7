//! LanceDB vector index
//!
//! One table per codebase (`codebase_<name>`) holding two vector columns: `vector`
//! over the chunk text and `description_vector` over its description. Chunks without
//! a description store a zero vector and `has_description = false`, and description
//! searches pre-filter on that flag.

use super::{
    CodebaseStats, IndexHit, IndexedChunk, VectorIndex, VectorSpace, sorted_breakdown,
};
use crate::error::VectorDbError;
use crate::types::{ChunkRecord, ChunkType, SearchFilters};
use anyhow::{Context, Result};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::collections::HashMap;
use std::sync::Arc;

const TABLE_PREFIX: &str = "codebase_";

/// Ids per `DELETE ... IN (...)` statement when replacing chunks
const DELETE_BATCH: usize = 256;

/// Columns returned to callers; vectors are never read back
const RECORD_COLUMNS: &[&str] = &[
    "id",
    "content",
    "chunk_type",
    "name",
    "parent_name",
    "file_path",
    "language",
    "line_start",
    "line_end",
    "description",
];

/// LanceDB vector index (embedded, no server required)
pub struct LanceVectorIndex {
    connection: Connection,
    db_path: String,
}

impl LanceVectorIndex {
    /// Create a new LanceDB index at the default platform path
    pub async fn new() -> Result<Self> {
        let db_path = crate::paths::PlatformPaths::default_lancedb_path();
        Self::with_path(&db_path.to_string_lossy()).await
    }

    /// Create a new LanceDB index with a custom path
    pub async fn with_path(db_path: &str) -> Result<Self> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            connection,
            db_path: db_path.to_string(),
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn table_name(codebase: &str) -> String {
        format!("{}{}", TABLE_PREFIX, codebase)
    }

    /// Create schema for a codebase table
    fn create_schema(dimension: usize) -> Arc<Schema> {
        let vector_type = DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimension as i32,
        );
        Arc::new(Schema::new(vec![
            Field::new("vector", vector_type.clone(), false),
            Field::new("description_vector", vector_type, false),
            Field::new("has_description", DataType::Boolean, false),
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_type", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("language", DataType::Utf8, false),
            Field::new("line_start", DataType::UInt32, false),
            Field::new("line_end", DataType::UInt32, false),
            Field::new("parent_name", DataType::Utf8, true),
            Field::new("description", DataType::Utf8, true),
        ]))
    }

    /// Open the table of a codebase, or None if it was never created
    async fn open(&self, codebase: &str) -> Result<Option<Table>> {
        let name = Self::table_name(codebase);
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        if !table_names.contains(&name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", name))?;
        Ok(Some(table))
    }

    /// Convert chunks to a RecordBatch
    fn create_record_batch(
        chunks: &[IndexedChunk],
        dimension: usize,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            chunks
                .iter()
                .map(|c| Some(c.content_vector.iter().copied().map(Some))),
            dimension as i32,
        );
        let zeros = vec![0.0f32; dimension];
        let description_vector_array =
            FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                chunks.iter().map(|c| {
                    let vector = c.description_vector.as_deref().unwrap_or(&zeros);
                    Some(vector.iter().copied().map(Some))
                }),
                dimension as i32,
            );
        let has_description_array = BooleanArray::from(
            chunks
                .iter()
                .map(|c| c.description_vector.is_some())
                .collect::<Vec<_>>(),
        );

        let text = |f: fn(&ChunkRecord) -> &str| {
            StringArray::from(chunks.iter().map(|c| f(&c.record)).collect::<Vec<_>>())
        };
        let optional_text = |f: fn(&ChunkRecord) -> Option<&str>| {
            StringArray::from(chunks.iter().map(|c| f(&c.record)).collect::<Vec<_>>())
        };
        let line = |f: fn(&ChunkRecord) -> usize| {
            UInt32Array::from(
                chunks
                    .iter()
                    .map(|c| f(&c.record) as u32)
                    .collect::<Vec<_>>(),
            )
        };

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(description_vector_array),
                Arc::new(has_description_array),
                Arc::new(text(|r| r.id.as_str())),
                Arc::new(text(|r| r.content.as_str())),
                Arc::new(text(|r| r.chunk_type.as_str())),
                Arc::new(text(|r| r.name.as_str())),
                Arc::new(text(|r| r.file_path.as_str())),
                Arc::new(text(|r| r.language.as_str())),
                Arc::new(line(|r| r.line_start)),
                Arc::new(line(|r| r.line_end)),
                Arc::new(optional_text(|r| r.parent_name.as_deref())),
                Arc::new(optional_text(|r| r.description.as_deref())),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn replace_existing(table: &Table, chunks: &[IndexedChunk]) -> Result<()> {
        for batch in chunks.chunks(DELETE_BATCH) {
            let ids = batch
                .iter()
                .map(|c| quote(&c.record.id))
                .collect::<Vec<_>>()
                .join(", ");
            table
                .delete(&format!("id IN ({})", ids))
                .await
                .context("Failed to delete replaced chunks")?;
        }
        Ok(())
    }
}

/// Quote a string literal for a LanceDB SQL predicate
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Compile filters into a SQL predicate, or None when no filter is set
fn filter_predicate(filters: &SearchFilters) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(ref chunk_type) = filters.chunk_type {
        clauses.push(format!(
            "chunk_type = {}",
            quote(ChunkType::parse(chunk_type).as_str())
        ));
    }
    if let Some(ref language) = filters.language {
        clauses.push(format!(
            "lower(language) = {}",
            quote(&language.to_lowercase())
        ));
    }
    if let Some(ref parent) = filters.parent_name {
        clauses.push(format!("parent_name = {}", quote(parent)));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
}

fn optional_value(array: Option<&StringArray>, row: usize) -> Option<String> {
    array
        .filter(|a| !a.is_null(row))
        .map(|a| a.value(row).to_string())
        .filter(|v| !v.is_empty())
}

/// Decode rows into records paired with their `_distance` (if the batch has one)
///
/// Rows missing a required field are skipped; a batch missing a required column is
/// skipped entirely.
fn decode_batch(batch: &RecordBatch) -> Vec<(ChunkRecord, Option<f32>)> {
    let (
        Some(id),
        Some(content),
        Some(chunk_type),
        Some(name),
        Some(file_path),
        Some(language),
        Some(line_start),
        Some(line_end),
    ) = (
        string_column(batch, "id"),
        string_column(batch, "content"),
        string_column(batch, "chunk_type"),
        string_column(batch, "name"),
        string_column(batch, "file_path"),
        string_column(batch, "language"),
        u32_column(batch, "line_start"),
        u32_column(batch, "line_end"),
    )
    else {
        tracing::warn!(
            "Skipping result batch of {} rows with missing or mistyped columns",
            batch.num_rows()
        );
        return Vec::new();
    };
    let parent_name = string_column(batch, "parent_name");
    let description = string_column(batch, "description");
    let distance = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let required: [&dyn Array; 8] = [
        id, content, chunk_type, name, file_path, language, line_start, line_end,
    ];

    let mut records = Vec::with_capacity(batch.num_rows());
    let mut skipped = 0usize;
    for row in 0..batch.num_rows() {
        if required.iter().any(|column| column.is_null(row)) || id.value(row).is_empty() {
            skipped += 1;
            continue;
        }
        let record = ChunkRecord {
            id: id.value(row).to_string(),
            content: content.value(row).to_string(),
            chunk_type: ChunkType::parse(chunk_type.value(row)),
            name: name.value(row).to_string(),
            parent_name: optional_value(parent_name, row),
            file_path: file_path.value(row).to_string(),
            language: language.value(row).to_string(),
            line_start: line_start.value(row) as usize,
            line_end: line_end.value(row) as usize,
            description: optional_value(description, row),
        };
        let row_distance = distance.filter(|d| !d.is_null(row)).map(|d| d.value(row));
        records.push((record, row_distance));
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} malformed rows", skipped);
    }
    records
}

#[async_trait::async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn search(
        &self,
        codebase: &str,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
        space: VectorSpace,
    ) -> Result<Vec<IndexHit>> {
        let Some(table) = self.open(codebase).await? else {
            tracing::debug!("Codebase '{}' has no table, returning no hits", codebase);
            return Ok(Vec::new());
        };

        let (column, mut clauses) = match space {
            VectorSpace::Content => ("vector", Vec::new()),
            VectorSpace::Description => {
                ("description_vector", vec!["has_description = true".to_string()])
            }
        };
        clauses.extend(filter_predicate(filters));

        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(|e| VectorDbError::SearchFailed {
                codebase: codebase.to_string(),
                reason: e.to_string(),
            })?
            .column(column)
            .distance_type(DistanceType::Cosine)
            .select(Select::Columns(
                RECORD_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ))
            .limit(top_k);

        if !clauses.is_empty() {
            query = query.only_if(clauses.join(" AND "));
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                codebase: codebase.to_string(),
                reason: e.to_string(),
            })?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut hits: Vec<IndexHit> = batches
            .iter()
            .flat_map(decode_batch)
            .filter_map(|(record, distance)| {
                distance.map(|distance| IndexHit { record, distance })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);

        tracing::debug!(
            "LanceDB {} search on '{}' returned {} hits",
            space.as_str(),
            codebase,
            hits.len()
        );
        Ok(hits)
    }

    async fn scan(
        &self,
        codebase: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ChunkRecord>> {
        let Some(table) = self.open(codebase).await? else {
            return Ok(Vec::new());
        };

        let mut query = table
            .query()
            .select(Select::Columns(
                RECORD_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ))
            .limit(limit);
        if let Some(predicate) = filter_predicate(filters) {
            query = query.only_if(predicate);
        }

        let stream = query
            .execute()
            .await
            .with_context(|| format!("Failed to scan codebase '{}'", codebase))?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut records: Vec<ChunkRecord> = batches
            .iter()
            .flat_map(decode_batch)
            .map(|(record, _)| record)
            .collect();
        records.truncate(limit);
        Ok(records)
    }

    async fn store_chunks(&self, codebase: &str, chunks: Vec<IndexedChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let dimension = chunks[0].content_vector.len();
        let mismatched = chunks.iter().find(|c| {
            c.content_vector.len() != dimension
                || c
                    .description_vector
                    .as_ref()
                    .is_some_and(|v| v.len() != dimension)
        });
        if let Some(chunk) = mismatched {
            return Err(VectorDbError::StoreFailed {
                codebase: codebase.to_string(),
                reason: format!(
                    "chunk '{}' has a vector whose dimension differs from {}",
                    chunk.record.id, dimension
                ),
            }
            .into());
        }

        let schema = Self::create_schema(dimension);
        let batch = Self::create_record_batch(&chunks, dimension, schema.clone())?;
        let count = batch.num_rows();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        match self.open(codebase).await? {
            Some(table) => {
                Self::replace_existing(&table, &chunks).await?;
                table
                    .add(Box::new(batches))
                    .execute()
                    .await
                    .map_err(|e| VectorDbError::StoreFailed {
                        codebase: codebase.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            None => {
                let name = Self::table_name(codebase);
                self.connection
                    .create_table(&name, Box::new(batches))
                    .execute()
                    .await
                    .map_err(|e| VectorDbError::StoreFailed {
                        codebase: codebase.to_string(),
                        reason: e.to_string(),
                    })?;
                tracing::info!("Created table '{}' ({} dims)", name, dimension);
            }
        }

        tracing::info!("Stored {} chunks for codebase '{}'", count, codebase);
        Ok(count)
    }

    async fn list_codebases(&self) -> Result<Vec<String>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        let mut codebases: Vec<String> = table_names
            .iter()
            .filter_map(|name| name.strip_prefix(TABLE_PREFIX))
            .map(str::to_string)
            .collect();
        codebases.sort();
        Ok(codebases)
    }

    async fn delete_codebase(&self, codebase: &str) -> Result<bool> {
        if self.open(codebase).await?.is_none() {
            return Ok(false);
        }

        // Empty namespace array selects the default namespace
        self.connection
            .drop_table(&Self::table_name(codebase), &[])
            .await
            .map_err(|e| VectorDbError::DeleteFailed(format!("{}: {}", codebase, e)))?;

        tracing::info!("Dropped table for codebase '{}'", codebase);
        Ok(true)
    }

    async fn codebase_stats(&self, codebase: &str) -> Result<Option<CodebaseStats>> {
        let Some(table) = self.open(codebase).await? else {
            return Ok(None);
        };

        let total_chunks = table
            .count_rows(None)
            .await
            .context("Failed to count rows")?;
        let chunks_with_description = table
            .count_rows(Some("has_description = true".to_string()))
            .await
            .context("Failed to count described rows")?;

        let stream = table
            .query()
            .select(Select::Columns(vec![
                "language".to_string(),
                "chunk_type".to_string(),
            ]))
            .execute()
            .await
            .context("Failed to query languages")?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut languages: HashMap<String, usize> = HashMap::new();
        let mut chunk_types: HashMap<String, usize> = HashMap::new();
        for batch in &batches {
            let (Some(language), Some(chunk_type)) = (
                string_column(batch, "language"),
                string_column(batch, "chunk_type"),
            ) else {
                continue;
            };
            for row in 0..batch.num_rows() {
                *languages.entry(language.value(row).to_string()).or_insert(0) += 1;
                *chunk_types
                    .entry(chunk_type.value(row).to_string())
                    .or_insert(0) += 1;
            }
        }

        Ok(Some(CodebaseStats {
            total_chunks,
            chunks_with_description,
            language_breakdown: sorted_breakdown(languages),
            chunk_type_breakdown: sorted_breakdown(chunk_types),
        }))
    }
}
