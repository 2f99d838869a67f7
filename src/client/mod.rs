//! Core library client for codebase-rag
//!
//! This module provides the main client interface for using codebase-rag
//! as a library in your own Rust applications.

use crate::cache::EmbeddingCache;
use crate::config::Config;
use crate::embedding::{EmbeddingIntent, EmbeddingProvider, EmbeddingService, FastEmbedManager};
use crate::error::{RagError, SearchError, VectorDbError};
use crate::llm::{GenerationOptions, build_backend};
use crate::retrieval::{
    ContextBuilder, HydeGenerator, LlmRelevanceJudge, LlmTranslator, format_search_summary,
};
use crate::search::SearchEngine;
use crate::types::*;
use crate::vector_db::{InMemoryVectorIndex, IndexedChunk, LanceVectorIndex, VectorIndex};

use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sampling settings for query translation
const TRANSLATION_TEMPERATURE: f32 = 0.1;
const TRANSLATION_MAX_TOKENS: u32 = 200;

/// Sampling settings for yes/no relevance answers
const JUDGE_TEMPERATURE: f32 = 0.1;
const JUDGE_MAX_TOKENS: u32 = 10;

/// Main client for interacting with the RAG system
///
/// This client owns the search engine and its collaborators. It contains all
/// the core functionality and can be used directly as a library or wrapped by
/// the MCP server.
///
/// # Example
///
/// ```no_run
/// use codebase_rag::{RagClient, SearchRequest, SearchType};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RagClient::new().await?;
///
///     let mut request = SearchRequest::new("authenticate a user", "my-service");
///     request.search_type = SearchType::Hybrid;
///     request.use_reranking = true;
///
///     let response = client.search(request).await?;
///     for result in &response.results {
///         println!("{} ({:.3}) {}", result.name, result.score, result.file_path);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RagClient {
    pub(crate) engine: Arc<SearchEngine>,
    pub(crate) context_builder: ContextBuilder,
    // Configuration (for batch sizes, timeouts, cache paths)
    pub(crate) config: Arc<Config>,
}

impl RagClient {
    /// Create a new RAG client with configuration from the default sources
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded or is invalid
    /// - Embedding model cannot be initialized
    /// - Vector database cannot be opened
    pub async fn new() -> Result<Self, RagError> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a new RAG client with custom configuration
    ///
    /// Generation backends are built from `config.llm`; a missing API key
    /// disables HyDE, translation and relevance judging rather than failing.
    pub async fn with_config(config: Config) -> Result<Self, RagError> {
        tracing::info!("Initializing RAG client with configuration");
        tracing::debug!("Vector DB backend: {}", config.vector_db.backend);
        tracing::debug!("Embedding model: {}", config.embedding.model_name);

        config.validate()?;

        let index: Arc<dyn VectorIndex> = match config.vector_db.backend.as_str() {
            "memory" => {
                tracing::info!("Using in-memory vector index");
                Arc::new(InMemoryVectorIndex::new())
            }
            "lancedb" => {
                tracing::info!(
                    "Using LanceDB vector database backend at {}",
                    config.vector_db.lancedb_path.display()
                );
                Arc::new(
                    LanceVectorIndex::with_path(&config.vector_db.lancedb_path.to_string_lossy())
                        .await
                        .context("Failed to initialize LanceDB vector database")?,
                )
            }
            other => return Err(VectorDbError::UnsupportedBackend(other.to_string()).into()),
        };

        let provider: Arc<dyn EmbeddingProvider> = Arc::new(
            FastEmbedManager::from_model_name(&config.embedding.model_name)
                .context("Failed to initialize embedding provider")?,
        );

        Ok(Self::with_components(config, provider, index))
    }

    /// Assemble a client from an explicit embedding provider and vector index
    ///
    /// Used by tests and by embedders that bring their own model or storage.
    pub fn with_components(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let cache = if config.cache.persist {
            let path = &config.cache.embedding_cache_path;
            tracing::info!("Using embedding cache file: {:?}", path);
            EmbeddingCache::load(path, provider.model_name(), config.cache.embedding_max_entries)
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to load embedding cache: {:#}, starting fresh", e);
                    EmbeddingCache::new(provider.model_name(), config.cache.embedding_max_entries)
                })
        } else {
            EmbeddingCache::new(provider.model_name(), config.cache.embedding_max_entries)
        };
        let embeddings = EmbeddingService::with_cache(provider, cache);

        let hyde_backend = config
            .hyde
            .enabled
            .then(|| {
                build_backend(
                    &config.llm,
                    GenerationOptions::new(config.hyde.temperature, config.hyde.max_tokens),
                )
            })
            .flatten();
        let translation_backend = config
            .translation
            .enabled
            .then(|| {
                build_backend(
                    &config.llm,
                    GenerationOptions::new(TRANSLATION_TEMPERATURE, TRANSLATION_MAX_TOKENS),
                )
            })
            .flatten();
        let judge_backend = config
            .relevance
            .enabled
            .then(|| {
                build_backend(
                    &config.llm,
                    GenerationOptions::new(JUDGE_TEMPERATURE, JUDGE_MAX_TOKENS),
                )
            })
            .flatten();

        let engine = SearchEngine::new(embeddings, index)
            .configured(&config)
            .with_hyde(HydeGenerator::new(hyde_backend, config.hyde.enabled))
            .with_translator(Arc::new(LlmTranslator::new(
                translation_backend,
                config.translation.enabled,
                config.translation.cache_max_entries,
            )))
            .with_judge(Arc::new(LlmRelevanceJudge::new(
                judge_backend,
                config.relevance.enabled,
                config.relevance.max_code_chars,
            )));

        Self::from_engine(config, engine)
    }

    /// Wrap a fully assembled engine
    pub fn from_engine(config: Config, engine: SearchEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            context_builder: ContextBuilder::new(config.search.max_context_tokens),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn embedding_dimension(&self) -> usize {
        self.engine.embeddings().dimension()
    }

    /// Search an indexed codebase
    ///
    /// Retrieval stages never fail the call: they degrade and log. The only
    /// errors are request validation and [`SearchError::TimedOut`].
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, RagError> {
        request.validate(self.config.search.max_top_k)?;

        let start = Instant::now();
        let timeout_secs = self.config.search.timeout_secs;
        let results = if timeout_secs == 0 {
            self.engine.search(&request).await
        } else {
            tokio::time::timeout(Duration::from_secs(timeout_secs), self.engine.search(&request))
                .await
                .map_err(|_| {
                    tracing::warn!(
                        "Search for '{}' in '{}' abandoned after {}s",
                        request.query,
                        request.codebase_name,
                        timeout_secs
                    );
                    SearchError::TimedOut {
                        query: request.query.clone(),
                        codebase_name: request.codebase_name.clone(),
                        secs: timeout_secs,
                    }
                })?
        };

        let (context, summary) = if request.include_context {
            (
                Some(self.context_builder.build_context(&results, &request.query)),
                Some(format_search_summary(&request.query, &results, None)),
            )
        } else {
            (None, None)
        };

        Ok(SearchResponse {
            total_results: results.len(),
            query: request.query,
            codebase_name: request.codebase_name,
            search_type: request.search_type,
            use_hyde: request.use_hyde,
            use_reranking: request.use_reranking,
            results,
            context,
            summary,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Embed and store pre-parsed chunks
    ///
    /// A chunk whose content cannot be embedded is skipped and reported in
    /// `errors`; a failed description embedding only drops the description vector.
    pub async fn index_chunks(
        &self,
        request: IndexChunksRequest,
    ) -> Result<IndexChunksResponse, RagError> {
        request.validate()?;
        let start = Instant::now();
        let chunks_received = request.chunks.len();
        let batch_size = self.config.embedding.batch_size;
        let embeddings = self.engine.embeddings();

        let contents: Vec<String> = request.chunks.iter().map(|c| c.content.clone()).collect();
        let content_vectors = embeddings
            .embed_many(&contents, EmbeddingIntent::Document, batch_size)
            .await;

        let described: Vec<usize> = (0..request.chunks.len())
            .filter(|&i| {
                request.chunks[i]
                    .description
                    .as_deref()
                    .is_some_and(|d| !d.trim().is_empty())
            })
            .collect();
        let descriptions: Vec<String> = described
            .iter()
            .filter_map(|&i| request.chunks[i].description.clone())
            .collect();
        let mut description_vectors: Vec<Option<Vec<f32>>> = vec![None; request.chunks.len()];
        for (&i, vector) in described.iter().zip(
            embeddings
                .embed_many(&descriptions, EmbeddingIntent::Document, batch_size)
                .await,
        ) {
            description_vectors[i] = vector;
        }

        let mut errors = Vec::new();
        let mut descriptions_embedded = 0;
        let mut indexed = Vec::with_capacity(chunks_received);
        for ((record, content_vector), description_vector) in request
            .chunks
            .into_iter()
            .zip(content_vectors)
            .zip(description_vectors)
        {
            let Some(content_vector) = content_vector else {
                errors.push(format!("Failed to embed content of chunk '{}'", record.id));
                continue;
            };
            if description_vector.is_some() {
                descriptions_embedded += 1;
            } else if record.description.as_deref().is_some_and(|d| !d.trim().is_empty()) {
                errors.push(format!("Failed to embed description of chunk '{}'", record.id));
            }
            indexed.push(IndexedChunk {
                record,
                content_vector,
                description_vector,
            });
        }

        let chunks_stored = if indexed.is_empty() {
            0
        } else {
            self.engine
                .index()
                .store_chunks(&request.codebase_name, indexed)
                .await
                .map_err(|e| VectorDbError::StoreFailed {
                    codebase: request.codebase_name.clone(),
                    reason: format!("{:#}", e),
                })?
        };

        tracing::info!(
            "Indexed {} of {} chunks into '{}' ({} with descriptions, {} errors)",
            chunks_stored,
            chunks_received,
            request.codebase_name,
            descriptions_embedded,
            errors.len()
        );

        if self.config.cache.persist
            && let Err(e) = self.save_embedding_cache()
        {
            tracing::warn!("Failed to save embedding cache: {}", e);
        }

        Ok(IndexChunksResponse {
            codebase_name: request.codebase_name,
            chunks_received,
            chunks_stored,
            descriptions_embedded,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub async fn list_codebases(&self) -> Result<ListCodebasesResponse, RagError> {
        let codebases = self
            .engine
            .index()
            .list_codebases()
            .await
            .context("Failed to list codebases")?;
        Ok(ListCodebasesResponse { codebases })
    }

    /// Chunk counts for one codebase; an unknown codebase reports zero chunks
    pub async fn codebase_stats(
        &self,
        request: CodebaseStatsRequest,
    ) -> Result<CodebaseStatsResponse, RagError> {
        validate_codebase_name(&request.codebase_name)?;
        let stats = self
            .engine
            .index()
            .codebase_stats(&request.codebase_name)
            .await
            .with_context(|| format!("Failed to read stats for '{}'", request.codebase_name))?
            .unwrap_or_default();

        let entries = |pairs: Vec<(String, usize)>| -> Vec<CountEntry> {
            pairs
                .into_iter()
                .map(|(key, count)| CountEntry { key, count })
                .collect()
        };
        Ok(CodebaseStatsResponse {
            codebase_name: request.codebase_name,
            total_chunks: stats.total_chunks,
            chunks_with_description: stats.chunks_with_description,
            language_breakdown: entries(stats.language_breakdown),
            chunk_type_breakdown: entries(stats.chunk_type_breakdown),
        })
    }

    pub async fn delete_codebase(
        &self,
        request: DeleteCodebaseRequest,
    ) -> Result<DeleteCodebaseResponse, RagError> {
        validate_codebase_name(&request.codebase_name)?;
        let deleted = self
            .engine
            .index()
            .delete_codebase(&request.codebase_name)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete '{}': {:#}", request.codebase_name, e);
                VectorDbError::DeleteFailed(request.codebase_name.clone())
            })?;

        let message = if deleted {
            format!("Deleted codebase '{}'", request.codebase_name)
        } else {
            format!("Codebase '{}' was not indexed", request.codebase_name)
        };
        Ok(DeleteCodebaseResponse {
            success: deleted,
            message,
        })
    }

    /// Write the embedding cache to its configured path
    pub fn save_embedding_cache(&self) -> Result<(), RagError> {
        self.engine
            .embeddings()
            .save_cache(&self.config.cache.embedding_cache_path)
            .context("Failed to save embedding cache")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
