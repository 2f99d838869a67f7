// LanceDB is the default embedded vector database
pub mod lance_client;
pub use lance_client::LanceVectorIndex;

// Brute-force in-process index for tests and ephemeral sessions
pub mod memory;
pub use memory::InMemoryVectorIndex;

use crate::types::{ChunkRecord, SearchFilters};
use anyhow::Result;
use std::collections::HashMap;

/// Which of the two parallel embedding spaces a search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSpace {
    /// Vectors of the raw chunk text
    Content,
    /// Vectors of the natural-language description; chunks without one are not searchable here
    Description,
}

impl VectorSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSpace::Content => "content",
            VectorSpace::Description => "description",
        }
    }
}

/// A nearest-neighbor hit; lower distance means closer
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub record: ChunkRecord,
    pub distance: f32,
}

/// A chunk ready to be written, with its content and optional description vector
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub record: ChunkRecord,
    pub content_vector: Vec<f32>,
    pub description_vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodebaseStats {
    pub total_chunks: usize,
    pub chunks_with_description: usize,
    pub language_breakdown: Vec<(String, usize)>,
    pub chunk_type_breakdown: Vec<(String, usize)>,
}

/// Per-codebase nearest-neighbor index over content and description vectors
///
/// An unknown codebase is never an error: searches and scans return nothing.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbors of `vector` in `space`, closest first
    async fn search(
        &self,
        codebase: &str,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
        space: VectorSpace,
    ) -> Result<Vec<IndexHit>>;

    /// Enumerate up to `limit` stored chunks in storage order
    async fn scan(
        &self,
        codebase: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ChunkRecord>>;

    /// Insert chunks, replacing any stored chunk with the same id
    async fn store_chunks(&self, codebase: &str, chunks: Vec<IndexedChunk>) -> Result<usize>;

    async fn list_codebases(&self) -> Result<Vec<String>>;

    /// Returns false if the codebase did not exist
    async fn delete_codebase(&self, codebase: &str) -> Result<bool>;

    /// None if the codebase does not exist
    async fn codebase_stats(&self, codebase: &str) -> Result<Option<CodebaseStats>>;
}

/// Cosine distance (1 - cosine similarity); zero-length vectors are maximally distant
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Sort counts descending, then by key for a stable presentation
pub(crate) fn sorted_breakdown(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut breakdown: Vec<(String, usize)> = counts.into_iter().collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 2.0);
    }

    #[test]
    fn test_sorted_breakdown() {
        let mut counts = HashMap::new();
        counts.insert("rust".to_string(), 2);
        counts.insert("python".to_string(), 5);
        counts.insert("go".to_string(), 2);

        assert_eq!(
            sorted_breakdown(counts),
            vec![
                ("python".to_string(), 5),
                ("go".to_string(), 2),
                ("rust".to_string(), 2)
            ]
        );
    }
}
