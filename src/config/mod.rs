/// Configuration system for codebase-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Text generation backends shared by HyDE, translation and relevance judging
    #[serde(default)]
    pub llm: LlmConfig,

    /// Hypothetical document generation
    #[serde(default)]
    pub hyde: HydeConfig,

    /// Query translation for description search
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Relevance judging for description search fallback
    #[serde(default)]
    pub relevance: RelevanceConfig,

    /// Search orchestration
    #[serde(default)]
    pub search: SearchConfig,

    /// Reranking and post-filters
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Database backend: "lancedb" or "memory"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// LanceDB data directory path
    #[serde(default = "default_lancedb_path")]
    pub lancedb_path: PathBuf,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "intfloat/multilingual-e5-small", "BAAI/bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Batch size for document embedding during ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Generation backend selection and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend: "gemini" or "openai"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Usually supplied through GEMINI_API_KEY rather than the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    /// Usually supplied through OPENAI_API_KEY rather than the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// HTTP timeout for a single generation request
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Hypothetical document generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydeConfig {
    /// When false every HyDE call returns the original query
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_hyde_temperature")]
    pub temperature: f32,

    #[serde(default = "default_hyde_max_tokens")]
    pub max_tokens: u32,

    /// Fan-out of the stage-one preliminary search
    #[serde(default = "default_preliminary_top_k")]
    pub preliminary_top_k: usize,

    /// Preliminary results folded into the stage-two context
    #[serde(default = "default_context_results")]
    pub context_results: usize,

    /// Character budget of the stage-two context
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    /// RRF weight of the HyDE leg in HyDE-hybrid search
    #[serde(default = "default_hyde_leg_weight")]
    pub hybrid_hyde_weight: f32,

    /// RRF weight of the description leg in HyDE-hybrid search
    #[serde(default = "default_description_leg_weight")]
    pub hybrid_description_weight: f32,
}

/// Query translation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cached translations kept before the oldest half is evicted
    #[serde(default = "default_translation_cache_entries")]
    pub cache_max_entries: usize,
}

/// Relevance judge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Characters of code shown to the judge
    #[serde(default = "default_judge_code_chars")]
    pub max_code_chars: usize,
}

/// Search orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result count used when a caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest accepted top_k
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Candidates enumerated for keyword scoring
    #[serde(default = "default_keyword_pool_size")]
    pub keyword_pool_size: usize,

    /// RRF damping constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// RRF weight of the semantic leg in hybrid search
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// RRF weight of the keyword leg in hybrid search
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Deadline for a whole search call, 0 disables it
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Token budget of the assembled context (about 4 characters per token)
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
}

/// Reranker weights and post-filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    #[serde(default = "default_name_weight")]
    pub name_weight: f32,

    #[serde(default = "default_description_weight")]
    pub description_weight: f32,

    #[serde(default = "default_chunk_type_weight")]
    pub chunk_type_weight: f32,

    #[serde(default = "default_file_path_weight")]
    pub file_path_weight: f32,

    /// Confidence filter threshold (0.0 to 1.0)
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Diversity filter cap per file
    #[serde(default = "default_max_per_file")]
    pub max_per_file: usize,

    /// Candidates fetched per requested result when reranking
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Embedding cache file path
    #[serde(default = "default_embedding_cache_path")]
    pub embedding_cache_path: PathBuf,

    /// Entries kept in memory; inserts beyond the cap are dropped
    #[serde(default = "default_embedding_max_entries")]
    pub embedding_max_entries: usize,

    /// Load the cache at startup and save it on shutdown
    #[serde(default = "default_true")]
    pub persist: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_db_backend() -> String {
    "lancedb".to_string()
}

fn default_lancedb_path() -> PathBuf {
    crate::paths::PlatformPaths::default_lancedb_path()
}

fn default_model_name() -> String {
    "intfloat/multilingual-e5-small".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_hyde_temperature() -> f32 {
    0.3
}

fn default_hyde_max_tokens() -> u32 {
    500
}

fn default_preliminary_top_k() -> usize {
    5
}

fn default_context_results() -> usize {
    3
}

fn default_context_chars() -> usize {
    3000
}

fn default_hyde_leg_weight() -> f32 {
    0.6
}

fn default_description_leg_weight() -> f32 {
    0.4
}

fn default_translation_cache_entries() -> usize {
    1000
}

fn default_judge_code_chars() -> usize {
    500
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    50
}

fn default_keyword_pool_size() -> usize {
    1000
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_search_timeout() -> u64 {
    60
}

fn default_max_context_tokens() -> usize {
    8000
}

fn default_vector_weight() -> f32 {
    0.4
}

fn default_name_weight() -> f32 {
    0.25
}

fn default_description_weight() -> f32 {
    0.15
}

fn default_chunk_type_weight() -> f32 {
    0.1
}

fn default_file_path_weight() -> f32 {
    0.1
}

fn default_min_score() -> f32 {
    0.3
}

fn default_max_per_file() -> usize {
    2
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_embedding_cache_path() -> PathBuf {
    crate::paths::PlatformPaths::default_embedding_cache_path()
}

fn default_embedding_max_entries() -> usize {
    50_000
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            lancedb_path: default_lancedb_path(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            gemini_model: default_gemini_model(),
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            gemini_api_key: None,
            openai_api_key: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for HydeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature: default_hyde_temperature(),
            max_tokens: default_hyde_max_tokens(),
            preliminary_top_k: default_preliminary_top_k(),
            context_results: default_context_results(),
            context_chars: default_context_chars(),
            hybrid_hyde_weight: default_hyde_leg_weight(),
            hybrid_description_weight: default_description_leg_weight(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_max_entries: default_translation_cache_entries(),
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_code_chars: default_judge_code_chars(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            keyword_pool_size: default_keyword_pool_size(),
            rrf_k: default_rrf_k(),
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            timeout_secs: default_search_timeout(),
            max_context_tokens: default_max_context_tokens(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            name_weight: default_name_weight(),
            description_weight: default_description_weight(),
            chunk_type_weight: default_chunk_type_weight(),
            file_path_weight: default_file_path_weight(),
            min_score: default_min_score(),
            max_per_file: default_max_per_file(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            embedding_cache_path: default_embedding_cache_path(),
            embedding_max_entries: default_embedding_max_entries(),
            persist: true,
        }
    }
}

impl LlmConfig {
    /// API key of the selected provider, ignoring blank values
    pub fn active_api_key(&self) -> Option<&str> {
        let key = match self.provider.as_str() {
            "openai" => self.openai_api_key.as_deref(),
            _ => self.gemini_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RagError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if !matches!(self.vector_db.backend.as_str(), "lancedb" | "memory") {
            return Err(invalid(
                "vector_db.backend",
                format!(
                    "must be 'lancedb' or 'memory', got '{}'",
                    self.vector_db.backend
                ),
            ));
        }

        if !matches!(self.llm.provider.as_str(), "gemini" | "openai") {
            return Err(invalid(
                "llm.provider",
                format!("must be 'gemini' or 'openai', got '{}'", self.llm.provider),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }

        if self.search.max_top_k == 0 {
            return Err(invalid("search.max_top_k", "must be greater than 0"));
        }

        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(invalid(
                "search.default_top_k",
                format!(
                    "must be between 1 and {}, got {}",
                    self.search.max_top_k, self.search.default_top_k
                ),
            ));
        }

        if self.search.keyword_pool_size == 0 {
            return Err(invalid("search.keyword_pool_size", "must be greater than 0"));
        }

        if self.search.rrf_k < 0.0 {
            return Err(invalid(
                "search.rrf_k",
                format!("must not be negative, got {}", self.search.rrf_k),
            ));
        }

        let weights = [
            ("search.semantic_weight", self.search.semantic_weight),
            ("search.keyword_weight", self.search.keyword_weight),
            ("hyde.hybrid_hyde_weight", self.hyde.hybrid_hyde_weight),
            (
                "hyde.hybrid_description_weight",
                self.hyde.hybrid_description_weight,
            ),
            ("rerank.vector_weight", self.rerank.vector_weight),
            ("rerank.name_weight", self.rerank.name_weight),
            ("rerank.description_weight", self.rerank.description_weight),
            ("rerank.chunk_type_weight", self.rerank.chunk_type_weight),
            ("rerank.file_path_weight", self.rerank.file_path_weight),
        ];
        for (key, weight) in weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(invalid(key, format!("must be a non-negative number, got {}", weight)));
            }
        }

        if !(0.0..=1.0).contains(&self.rerank.min_score) {
            return Err(invalid(
                "rerank.min_score",
                format!("must be between 0.0 and 1.0, got {}", self.rerank.min_score),
            ));
        }

        if self.rerank.max_per_file == 0 {
            return Err(invalid("rerank.max_per_file", "must be greater than 0"));
        }

        if self.rerank.candidate_multiplier == 0 {
            return Err(invalid("rerank.candidate_multiplier", "must be greater than 0"));
        }

        if self.hyde.preliminary_top_k == 0 {
            return Err(invalid("hyde.preliminary_top_k", "must be greater than 0"));
        }

        if self.translation.cache_max_entries < 2 {
            return Err(invalid("translation.cache_max_entries", "must be at least 2"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("CODEBASE_RAG_DB_BACKEND") {
            self.vector_db.backend = backend;
        }

        if let Ok(path) = std::env::var("CODEBASE_RAG_LANCEDB_PATH") {
            self.vector_db.lancedb_path = PathBuf::from(path);
        }

        if let Ok(model) = std::env::var("CODEBASE_RAG_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(batch_size) = std::env::var("CODEBASE_RAG_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.embedding.batch_size = size;
        }

        if let Ok(min_score) = std::env::var("CODEBASE_RAG_MIN_SCORE")
            && let Ok(score) = min_score.parse()
        {
            self.rerank.min_score = score;
        }

        if let Ok(max_per_file) = std::env::var("CODEBASE_RAG_MAX_PER_FILE")
            && let Ok(cap) = max_per_file.parse()
        {
            self.rerank.max_per_file = cap;
        }

        if let Ok(top_k) = std::env::var("CODEBASE_RAG_TOP_K")
            && let Ok(k) = top_k.parse()
        {
            self.search.default_top_k = k;
        }

        if let Ok(enabled) = std::env::var("HYDE_ENABLED")
            && let Some(flag) = parse_bool(&enabled)
        {
            self.hyde.enabled = flag;
        }

        // HYDE_MODEL picks the generation provider; anything else stays as configured
        if let Ok(model) = std::env::var("HYDE_MODEL") {
            let model = model.trim().to_ascii_lowercase();
            if model == "gemini" || model == "openai" {
                self.llm.provider = model;
            }
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.trim().is_empty()
        {
            self.llm.gemini_api_key = Some(key);
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.trim().is_empty()
        {
            self.llm.openai_api_key = Some(key);
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL")
            && !url.trim().is_empty()
        {
            self.llm.openai_base_url = url;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file (if given) then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            None => Self::new(),
        }
    }

    /// Configuration backed by the in-memory index with HyDE, translation and
    /// relevance judging switched off, and persistence disabled
    pub fn ephemeral() -> Self {
        let mut config = Self::default();
        config.vector_db.backend = "memory".to_string();
        config.hyde.enabled = false;
        config.translation.enabled = false;
        config.relevance.enabled = false;
        config.cache.persist = false;
        config.search.timeout_secs = 0;
        config
    }
}
