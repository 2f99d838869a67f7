/// Centralized error types for codebase-rag using thiserror
///
/// Retrieval stages degrade instead of failing (see `search`), so most of these
/// surface only from construction, configuration, validation and ingestion paths.
use thiserror::Error;

/// Main error type for the RAG system
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to vector index operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to connect to vector database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to store chunks for codebase '{codebase}': {reason}")]
    StoreFailed { codebase: String, reason: String },

    #[error("Failed to search codebase '{codebase}': {reason}")]
    SearchFailed { codebase: String, reason: String },

    #[error("Failed to delete codebase '{0}'")]
    DeleteFailed(String),

    #[error("Unsupported vector database backend: {0}")]
    UnsupportedBackend(String),
}

/// Errors raised by text generation backends (HyDE, translation, relevance judging)
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{backend} request failed: {reason}")]
    RequestFailed { backend: String, reason: String },

    #[error("{backend} returned HTTP {status}: {body}")]
    HttpStatus {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("{0} returned an empty response")]
    EmptyResponse(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid codebase name: {0}")]
    InvalidCodebaseName(String),

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Empty {0}")]
    Empty(String),
}

/// Errors related to cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to load cache from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save cache to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },
}

/// Structured failures of a whole search call.
///
/// Each variant carries the original query and codebase so callers can report
/// which request failed without keeping their own copy.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search for '{query}' in codebase '{codebase_name}' timed out after {secs} seconds")]
    TimedOut {
        query: String,
        codebase_name: String,
        secs: u64,
    },
}

// Conversion from anyhow::Error to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    /// Convert to a user-facing error string suitable for MCP responses
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Check if this is a user error (validation, bad config value) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RagError::Validation(_) | RagError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::VectorDb(VectorDbError::ConnectionFailed(_))
                | RagError::Generation(GenerationError::RequestFailed { .. })
                | RagError::Search(SearchError::TimedOut { .. })
                | RagError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Validation(ValidationError::Empty("codebase_name".to_string()));
        assert_eq!(err.to_string(), "Validation error: Empty codebase_name");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let rag_err: RagError = io_err.into();
        assert!(matches!(rag_err, RagError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let rag_err: RagError = anyhow_err.into();
        assert!(matches!(rag_err, RagError::Other(_)));
    }

    #[test]
    fn test_is_user_error() {
        let user_err =
            RagError::Validation(ValidationError::InvalidCodebaseName("a b".to_string()));
        assert!(user_err.is_user_error());

        let system_err = RagError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert!(!system_err.is_user_error());
    }

    #[test]
    fn test_is_retryable() {
        let retryable = RagError::Search(SearchError::TimedOut {
            query: "q".to_string(),
            codebase_name: "c".to_string(),
            secs: 5,
        });
        assert!(retryable.is_retryable());

        let not_retryable = RagError::Validation(ValidationError::Empty("query".to_string()));
        assert!(!not_retryable.is_retryable());
    }

    #[test]
    fn test_timed_out_carries_request_context() {
        let err = SearchError::TimedOut {
            query: "authenticate user".to_string(),
            codebase_name: "backend".to_string(),
            secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "Search for 'authenticate user' in codebase 'backend' timed out after 30 seconds"
        );
    }

    #[test]
    fn test_generation_http_status() {
        let err = GenerationError::HttpStatus {
            backend: "openai".to_string(),
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "openai returned HTTP 429: rate limited");
    }

    #[test]
    fn test_vector_db_store_failed() {
        let err = VectorDbError::StoreFailed {
            codebase: "demo".to_string(),
            reason: "schema mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to store chunks for codebase 'demo': schema mismatch"
        );
    }

    #[test]
    fn test_validation_error_constraint() {
        let err = ValidationError::ConstraintViolation {
            field: "top_k".to_string(),
            constraint: "between 1 and 50".to_string(),
            actual: "0".to_string(),
        };
        assert_eq!(err.to_string(), "top_k must be between 1 and 50, got 0");
    }

    #[test]
    fn test_error_chain() {
        let embedding_err = EmbeddingError::GenerationFailed("model error".to_string());
        let rag_err: RagError = embedding_err.into();
        assert!(matches!(rag_err, RagError::Embedding(_)));
        assert_eq!(
            rag_err.to_string(),
            "Embedding error: Failed to generate embeddings: model error"
        );
    }
}
