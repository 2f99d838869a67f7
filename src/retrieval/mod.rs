//! Retrieval building blocks composed by the search engine
//!
//! Everything here works on request-local `Vec<SearchResult>` values: fusion,
//! reranking and filtering are pure functions of their inputs, while the
//! generator, translator and judge wrap an optional [`GenerationBackend`]
//! and degrade to a no-op when it is absent.
//!
//! [`GenerationBackend`]: crate::llm::GenerationBackend

pub mod context;
pub mod filters;
pub mod fusion;
pub mod hyde;
pub mod prompts;
pub mod relevance;
pub mod rerank;
pub mod translation;

pub use context::{ContextBuilder, format_search_summary};
pub use filters::{ConfidenceFilter, DiversityFilter};
pub use fusion::{RankedList, reciprocal_rank_fusion};
pub use hyde::HydeGenerator;
pub use relevance::{LlmRelevanceJudge, RelevanceJudge};
pub use rerank::{RerankScore, RerankWeights, Reranker};
pub use translation::{LlmTranslator, PassthroughTranslator, Translator, contains_hangul};

use crate::types::SearchResult;
use std::cmp::Ordering;

/// Sort best-first by score; equal scores keep their input order
pub(crate) fn sort_by_score_desc(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
