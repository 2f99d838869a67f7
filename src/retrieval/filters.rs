use crate::types::SearchResult;
use std::collections::HashMap;

/// Drops results scoring below a minimum threshold
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFilter {
    pub min_score: f32,
}

impl ConfidenceFilter {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    /// Keep results with `score >= min_score`, preserving order
    pub fn filter(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let before = results.len();
        let kept: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.score >= self.min_score)
            .collect();

        tracing::info!(
            "Filtered {} results to {} (threshold: {})",
            before,
            kept.len(),
            self.min_score
        );
        kept
    }
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self::new(0.3)
    }
}

/// Caps how many results may come from the same file
///
/// Must run on an already sorted list: results are visited in order and a
/// result is kept only while its file is still under quota.
#[derive(Debug, Clone, Copy)]
pub struct DiversityFilter {
    pub max_per_file: usize,
}

impl DiversityFilter {
    pub fn new(max_per_file: usize) -> Self {
        Self { max_per_file }
    }

    pub fn filter(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let before = results.len();
        let mut per_file: HashMap<String, usize> = HashMap::new();
        let mut kept = Vec::with_capacity(results.len());

        for result in results {
            let count = per_file.entry(result.file_path.clone()).or_insert(0);
            if *count < self.max_per_file {
                *count += 1;
                kept.push(result);
            }
        }

        tracing::info!(
            "Diversified {} results to {} (max per file: {})",
            before,
            kept.len(),
            self.max_per_file
        );
        kept
    }
}

impl Default for DiversityFilter {
    fn default() -> Self {
        Self::new(2)
    }
}
