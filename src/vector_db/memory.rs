use super::{
    CodebaseStats, IndexHit, IndexedChunk, VectorIndex, VectorSpace, cosine_distance,
    sorted_breakdown,
};
use crate::types::{ChunkRecord, SearchFilters};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// Rows of one codebase in insertion order, with an id lookup
#[derive(Default)]
struct CodebaseRows {
    chunks: Vec<IndexedChunk>,
    positions: HashMap<String, usize>,
}

impl CodebaseRows {
    /// Replace the row with the same id in place, or append
    fn upsert(&mut self, chunk: IndexedChunk) {
        match self.positions.get(&chunk.record.id) {
            Some(&position) => self.chunks[position] = chunk,
            None => {
                self.positions
                    .insert(chunk.record.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
            }
        }
    }
}

type Codebases = HashMap<String, CodebaseRows>;

/// In-process vector index with exhaustive cosine search
///
/// Nothing is persisted. Chunks keep their insertion order, which is also the
/// order `scan` returns and the tie-break order of equal distances.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    codebases: RwLock<Codebases>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Codebases>> {
        self.codebases
            .read()
            .map_err(|e| anyhow::anyhow!("Failed to acquire index read lock: {}", e))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Codebases>> {
        self.codebases
            .write()
            .map_err(|e| anyhow::anyhow!("Failed to acquire index write lock: {}", e))
    }
}

#[async_trait::async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(
        &self,
        codebase: &str,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
        space: VectorSpace,
    ) -> Result<Vec<IndexHit>> {
        let codebases = self.read()?;
        let Some(rows) = codebases.get(codebase) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<IndexHit> = rows
            .chunks
            .iter()
            .filter(|chunk| filters.matches(&chunk.record))
            .filter_map(|chunk| {
                let target = match space {
                    VectorSpace::Content => Some(&chunk.content_vector),
                    VectorSpace::Description => chunk.description_vector.as_ref(),
                }?;
                Some(IndexHit {
                    record: chunk.record.clone(),
                    distance: cosine_distance(vector, target),
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn scan(
        &self,
        codebase: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ChunkRecord>> {
        let codebases = self.read()?;
        Ok(codebases
            .get(codebase)
            .map(|rows| {
                rows.chunks
                    .iter()
                    .filter(|chunk| filters.matches(&chunk.record))
                    .take(limit)
                    .map(|chunk| chunk.record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn store_chunks(&self, codebase: &str, chunks: Vec<IndexedChunk>) -> Result<usize> {
        let mut codebases = self.write()?;
        let stored = codebases.entry(codebase.to_string()).or_default();
        let count = chunks.len();

        for chunk in chunks {
            stored.upsert(chunk);
        }

        tracing::debug!("Stored {} chunks in memory for '{}'", count, codebase);
        Ok(count)
    }

    async fn list_codebases(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_codebase(&self, codebase: &str) -> Result<bool> {
        Ok(self.write()?.remove(codebase).is_some())
    }

    async fn codebase_stats(&self, codebase: &str) -> Result<Option<CodebaseStats>> {
        let codebases = self.read()?;
        let Some(CodebaseRows { chunks, .. }) = codebases.get(codebase) else {
            return Ok(None);
        };

        let mut languages: HashMap<String, usize> = HashMap::new();
        let mut chunk_types: HashMap<String, usize> = HashMap::new();
        for chunk in chunks {
            *languages.entry(chunk.record.language.clone()).or_insert(0) += 1;
            *chunk_types
                .entry(chunk.record.chunk_type.to_string())
                .or_insert(0) += 1;
        }

        Ok(Some(CodebaseStats {
            total_chunks: chunks.len(),
            chunks_with_description: chunks
                .iter()
                .filter(|c| c.description_vector.is_some())
                .count(),
            language_breakdown: sorted_breakdown(languages),
            chunk_type_breakdown: sorted_breakdown(chunk_types),
        }))
    }
}
