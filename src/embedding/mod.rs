mod fastembed_manager;

pub use fastembed_manager::FastEmbedManager;

use crate::cache::EmbeddingCache;
use crate::error::EmbeddingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Whether text is embedded as a search query or as indexed content
///
/// Asymmetric model families (E5, BGE) embed the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingIntent {
    Query,
    Document,
}

impl EmbeddingIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingIntent::Query => "query",
            EmbeddingIntent::Document => "document",
        }
    }
}

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>, intent: EmbeddingIntent) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Cached front of an [`EmbeddingProvider`]
///
/// Failures never escape: a text that cannot be embedded comes back as `None`
/// and the reason is logged.
#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<RwLock<EmbeddingCache>>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_cache_entries: usize) -> Self {
        let cache = EmbeddingCache::new(provider.model_name(), max_cache_entries);
        Self::with_cache(provider, cache)
    }

    pub fn with_cache(provider: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self {
            provider,
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Number of cached vectors
    pub fn cache_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    fn cached(&self, text: &str, intent: EmbeddingIntent) -> Option<Vec<f32>> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(text, intent).cloned())
    }

    fn remember(&self, text: &str, intent: EmbeddingIntent, vector: &[f32]) {
        if let Ok(mut cache) = self.cache.write()
            && !cache.insert(text, intent, vector.to_vec())
        {
            tracing::debug!("Embedding cache full, not caching new entry");
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> bool {
        let expected = self.provider.dimension();
        if vector.len() != expected {
            let err = EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            };
            tracing::warn!("Embedding model '{}': {}", self.provider.model_name(), err);
            return false;
        }
        true
    }

    async fn generate(&self, texts: Vec<String>, intent: EmbeddingIntent) -> Result<Vec<Vec<f32>>> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.embed_batch(texts, intent))
            .await
            .context("Embedding task panicked")?
    }

    /// Embed one text, consulting the cache first
    pub async fn embed(&self, text: &str, intent: EmbeddingIntent) -> Option<Vec<f32>> {
        if let Some(vector) = self.cached(text, intent) {
            tracing::debug!("Embedding cache hit ({})", intent.as_str());
            return Some(vector);
        }

        let vector = match self.generate(vec![text.to_string()], intent).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => {
                tracing::error!("Embedding provider returned no vector");
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to embed {} text: {:#}", intent.as_str(), e);
                return None;
            }
        };

        if !self.check_dimension(&vector) {
            return None;
        }
        self.remember(text, intent, &vector);
        Some(vector)
    }

    /// Embed many texts in batches of `batch_size`
    ///
    /// The output has one slot per input. When a whole batch fails its texts are
    /// retried one at a time so a single bad input does not sink its neighbours.
    pub async fn embed_many(
        &self,
        texts: &[String],
        intent: EmbeddingIntent,
        batch_size: usize,
    ) -> Vec<Option<Vec<f32>>> {
        let mut output: Vec<Option<Vec<f32>>> =
            texts.iter().map(|t| self.cached(t, intent)).collect();

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| output[i].is_none()).collect();
        if missing.is_empty() {
            return output;
        }
        tracing::debug!(
            "Embedding {} of {} texts ({} cached)",
            missing.len(),
            texts.len(),
            texts.len() - missing.len()
        );

        for batch in missing.chunks(batch_size.max(1)) {
            let batch_texts: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            match self.generate(batch_texts, intent).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for (&i, vector) in batch.iter().zip(vectors) {
                        if self.check_dimension(&vector) {
                            self.remember(&texts[i], intent, &vector);
                            output[i] = Some(vector);
                        }
                    }
                }
                Ok(vectors) => {
                    tracing::warn!(
                        "Embedding batch returned {} vectors for {} texts, retrying individually",
                        vectors.len(),
                        batch.len()
                    );
                    for &i in batch {
                        output[i] = self.embed(&texts[i], intent).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Embedding batch failed, retrying individually: {:#}", e);
                    for &i in batch {
                        output[i] = self.embed(&texts[i], intent).await;
                    }
                }
            }
        }

        output
    }

    /// Persist the cache as JSON
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        let cache = self
            .cache
            .read()
            .map_err(|e| anyhow::anyhow!("Embedding cache lock poisoned: {}", e))?;
        cache.save(path)
    }
}
