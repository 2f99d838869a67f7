use crate::error::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of code chunk produced by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Method,
    Class,
    /// Fallback for content the parser could not structure
    Text,
    /// Any chunk type this crate does not know about
    #[serde(other)]
    Other,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Function => "function",
            ChunkType::Method => "method",
            ChunkType::Class => "class",
            ChunkType::Text => "text",
            ChunkType::Other => "other",
        }
    }

    /// Parse a stored chunk type, mapping unknown values to `Other`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "function" => ChunkType::Function,
            "method" => ChunkType::Method,
            "class" => ChunkType::Class,
            "text" => ChunkType::Text,
            _ => ChunkType::Other,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Query embedding against content vectors
    #[default]
    Semantic,
    /// Reciprocal-rank fusion of two retrieval legs
    Hybrid,
    /// Lexical scoring over a large candidate pool
    Keyword,
    /// Query embedding against description vectors
    Description,
    /// Single-stage hypothetical code search
    Hyde,
    /// Two-stage hypothetical code search
    HydeFull,
    /// Description search that falls back to two-stage HyDE when the top hit is judged irrelevant
    DescriptionFallback,
    /// Anything else; routed to semantic search
    #[serde(other)]
    Unrecognized,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Semantic => "semantic",
            SearchType::Hybrid => "hybrid",
            SearchType::Keyword => "keyword",
            SearchType::Description => "description",
            SearchType::Hyde => "hyde",
            SearchType::HydeFull => "hyde_full",
            SearchType::DescriptionFallback => "description_fallback",
            SearchType::Unrecognized => "unrecognized",
        }
    }

    /// Parse a search type name, returning `Unrecognized` for unknown names
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "semantic" => SearchType::Semantic,
            "hybrid" => SearchType::Hybrid,
            "keyword" => SearchType::Keyword,
            "description" => SearchType::Description,
            "hyde" => SearchType::Hyde,
            "hyde_full" => SearchType::HydeFull,
            "description_fallback" => SearchType::DescriptionFallback,
            _ => SearchType::Unrecognized,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional equality filters applied inside the vector index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchFilters {
    /// Restrict to one chunk type (function, method, class, text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
    /// Restrict to one language (e.g. "python")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Restrict to chunks enclosed by this scope (e.g. a class name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.chunk_type.is_none() && self.language.is_none() && self.parent_name.is_none()
    }

    pub fn with_chunk_type(mut self, chunk_type: impl Into<String>) -> Self {
        self.chunk_type = Some(chunk_type.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_parent_name(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    /// Check a stored record against every set filter
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        if let Some(ref chunk_type) = self.chunk_type
            && ChunkType::parse(chunk_type) != record.chunk_type
        {
            return false;
        }
        if let Some(ref language) = self.language
            && !language.eq_ignore_ascii_case(&record.language)
        {
            return false;
        }
        if let Some(ref parent) = self.parent_name
            && record.parent_name.as_deref() != Some(parent.as_str())
        {
            return false;
        }
        true
    }
}

/// Keys written into [`ResultMetadata`] by the pipeline stages.
///
/// Stages only ever add keys; nothing downstream removes what an earlier stage wrote.
pub mod meta {
    // semantic / description / hyde ingestion
    pub const SEARCH_METHOD: &str = "search_method";
    pub const DISTANCE: &str = "distance";
    pub const SIMILARITY: &str = "similarity";

    // keyword
    pub const KEYWORD_MATCHES: &str = "keyword_matches";

    // description
    pub const ORIGINAL_QUERY: &str = "original_query";
    pub const TRANSLATED_QUERY: &str = "translated_query";

    // hyde
    pub const HYDE_VARIANT: &str = "hyde_variant";
    pub const HYDE_STAGE1_CHARS: &str = "hyde_stage1_chars";
    pub const HYDE_STAGE2_CHARS: &str = "hyde_stage2_chars";
    pub const HYDE_FALLBACK_STAGE1: &str = "hyde_fallback_stage1";

    // fusion
    pub const HYBRID_LEGS: &str = "hybrid_legs";
    pub const RRF_SCORE: &str = "rrf_score";

    // description_fallback
    pub const FALLBACK_REASON: &str = "fallback_reason";

    // rerank
    pub const RERANK_SCORE: &str = "rerank_score";
    pub const VECTOR_SCORE: &str = "vector_score";
    pub const NAME_MATCH_SCORE: &str = "name_match_score";
    pub const DESCRIPTION_SCORE: &str = "description_score";
    pub const CHUNK_TYPE_SCORE: &str = "chunk_type_score";
    pub const FILE_PATH_SCORE: &str = "file_path_score";
    pub const RERANKED: &str = "reranked";

    /// Per-leg rank key written during fusion, e.g. `semantic_rank`
    pub fn leg_rank(leg: &str) -> String {
        format!("{}_rank", leg)
    }
}

/// Provenance accumulated by a result as it moves through the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ResultMetadata(BTreeMap<String, serde_json::Value>);

impl ResultMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under `key`; a later stage may refine the value but never drop the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Add every key of `other` not already present; existing values win
    pub fn merge_missing(&mut self, other: ResultMetadata) {
        for (key, value) in other.0 {
            self.0.entry(key).or_insert(value);
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// A parsed code chunk as stored in (and returned by) the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkRecord {
    /// Unique identifier within one codebase
    pub id: String,
    /// Full text of the chunk
    pub content: String,
    pub chunk_type: ChunkType,
    /// Identifier of the function, method or class
    pub name: String,
    /// Enclosing scope, e.g. the class of a method
    #[serde(default)]
    pub parent_name: Option<String>,
    pub file_path: String,
    pub language: String,
    pub line_start: usize,
    pub line_end: usize,
    /// Natural-language summary of the chunk
    #[serde(default)]
    pub description: Option<String>,
}

/// The unit of retrieval output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub chunk_type: ChunkType,
    pub name: String,
    pub parent_name: Option<String>,
    pub file_path: String,
    pub language: String,
    pub line_start: usize,
    pub line_end: usize,
    pub description: Option<String>,
    /// Higher is better across every stage
    pub score: f32,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl SearchResult {
    pub fn from_record(record: ChunkRecord, score: f32) -> Self {
        Self {
            id: record.id,
            content: record.content,
            chunk_type: record.chunk_type,
            name: record.name,
            parent_name: record.parent_name,
            file_path: record.file_path,
            language: record.language,
            line_start: record.line_start,
            line_end: record.line_end,
            description: record.description,
            score,
            metadata: ResultMetadata::new(),
        }
    }
}

/// Request to search an indexed codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Natural-language (or keyword) query
    pub query: String,
    /// Name of the codebase to search
    pub codebase_name: String,
    /// Number of results to return (default: the server's configured default_top_k)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Retrieval strategy (default: semantic)
    #[serde(default)]
    pub search_type: SearchType,
    /// Optional chunk_type / language / parent_name filters
    #[serde(default)]
    pub filters: SearchFilters,
    /// Enhance the query with hypothetical code generation
    #[serde(default)]
    pub use_hyde: bool,
    /// Apply heuristic reranking plus confidence and diversity filtering
    #[serde(default)]
    pub use_reranking: bool,
    /// Attach formatted context and a summary to the response (default: true)
    #[serde(default = "default_true")]
    pub include_context: bool,
}

fn default_true() -> bool {
    true
}

/// Check a codebase name is usable as an index table suffix
pub fn validate_codebase_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Empty("codebase_name".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::InvalidCodebaseName(format!(
            "'{}' may only contain letters, digits, '_', '-' and '.'",
            name
        )));
    }
    Ok(())
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, codebase_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            codebase_name: codebase_name.into(),
            top_k: None,
            search_type: SearchType::default(),
            filters: SearchFilters::default(),
            use_hyde: false,
            use_reranking: false,
            include_context: true,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// The requested result count, or `default` when none was given
    pub fn top_k_or(&self, default: usize) -> usize {
        self.top_k.unwrap_or(default)
    }

    /// Check the codebase name and, when given, that `top_k` is in `1..=max_top_k`
    pub fn validate(&self, max_top_k: usize) -> Result<(), ValidationError> {
        validate_codebase_name(&self.codebase_name)?;
        if let Some(top_k) = self.top_k
            && (top_k == 0 || top_k > max_top_k)
        {
            return Err(ValidationError::ConstraintViolation {
                field: "top_k".to_string(),
                constraint: format!("between 1 and {}", max_top_k),
                actual: top_k.to_string(),
            });
        }
        Ok(())
    }
}

/// Response from a search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    pub query: String,
    pub codebase_name: String,
    pub search_type: SearchType,
    pub use_hyde: bool,
    pub use_reranking: bool,
    /// Ranked results, best first
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    /// Markdown context built from the results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// One-paragraph summary of the results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Request to add pre-parsed chunks to a codebase index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexChunksRequest {
    pub codebase_name: String,
    pub chunks: Vec<ChunkRecord>,
}

impl IndexChunksRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_codebase_name(&self.codebase_name)?;
        if let Some(chunk) = self.chunks.iter().find(|c| c.id.trim().is_empty()) {
            return Err(ValidationError::ConstraintViolation {
                field: "chunks[].id".to_string(),
                constraint: "non-empty".to_string(),
                actual: format!("empty id for chunk '{}'", chunk.name),
            });
        }
        Ok(())
    }
}

/// Response from chunk ingestion
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexChunksResponse {
    pub codebase_name: String,
    pub chunks_received: usize,
    pub chunks_stored: usize,
    pub descriptions_embedded: usize,
    /// Non-fatal per-chunk failures
    #[serde(default)]
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Request to list indexed codebases
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListCodebasesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCodebasesResponse {
    pub codebases: Vec<String>,
}

/// Request for statistics about one codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodebaseStatsRequest {
    pub codebase_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

/// Statistics about one indexed codebase
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CodebaseStatsResponse {
    pub codebase_name: String,
    pub total_chunks: usize,
    pub chunks_with_description: usize,
    pub language_breakdown: Vec<CountEntry>,
    pub chunk_type_breakdown: Vec<CountEntry>,
}

/// Request to delete a codebase index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteCodebaseRequest {
    pub codebase_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteCodebaseResponse {
    pub success: bool,
    pub message: String,
}
