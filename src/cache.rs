use crate::embedding::EmbeddingIntent;
use crate::error::CacheError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Content-addressed cache of embedding vectors
///
/// Keys are the hex SHA-256 of the intent tag, a NUL separator and the text, so the
/// same text embedded as a query and as a document occupies two entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    /// Model the vectors were produced by; a cache for another model is discarded on load
    #[serde(default)]
    pub model_name: String,

    /// Map of cache key -> vector
    pub entries: HashMap<String, Vec<f32>>,

    #[serde(skip, default = "default_max_entries")]
    max_entries: usize,
}

fn default_max_entries() -> usize {
    50_000
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new("", default_max_entries())
    }
}

impl EmbeddingCache {
    pub fn new(model_name: impl Into<String>, max_entries: usize) -> Self {
        Self {
            model_name: model_name.into(),
            entries: HashMap::new(),
            max_entries,
        }
    }

    /// Cache key for `text` embedded with `intent`
    pub fn key(text: &str, intent: EmbeddingIntent) -> String {
        let mut hasher = Sha256::new();
        hasher.update(intent.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, text: &str, intent: EmbeddingIntent) -> Option<&Vec<f32>> {
        self.entries.get(&Self::key(text, intent))
    }

    /// Store a vector; returns false when the cache is full and the entry was dropped
    pub fn insert(&mut self, text: &str, intent: EmbeddingIntent, vector: Vec<f32>) -> bool {
        let key = Self::key(text, intent);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            return false;
        }
        self.entries.insert(key, vector);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Load cache from disk
    ///
    /// A missing file, or a file written for a different model, yields an empty cache.
    pub fn load(cache_path: &Path, model_name: &str, max_entries: usize) -> Result<Self> {
        if !cache_path.exists() {
            tracing::debug!("Embedding cache file not found, starting with empty cache");
            return Ok(Self::new(model_name, max_entries));
        }

        let load_failed = |reason: String| CacheError::LoadFailed {
            path: cache_path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(cache_path).map_err(|e| load_failed(e.to_string()))?;
        let mut cache: EmbeddingCache =
            serde_json::from_str(&content).map_err(|e| load_failed(e.to_string()))?;

        if cache.model_name != model_name {
            tracing::info!(
                "Embedding cache was built with '{}', discarding it for '{}'",
                cache.model_name,
                model_name
            );
            return Ok(Self::new(model_name, max_entries));
        }

        cache.max_entries = max_entries;
        if cache.entries.len() > max_entries {
            let excess: Vec<String> = cache
                .entries
                .keys()
                .skip(max_entries)
                .cloned()
                .collect();
            for key in excess {
                cache.entries.remove(&key);
            }
        }

        tracing::info!("Loaded embedding cache with {} entries", cache.entries.len());
        Ok(cache)
    }

    /// Save cache to disk
    pub fn save(&self, cache_path: &Path) -> Result<()> {
        let save_failed = |reason: String| CacheError::SaveFailed {
            path: cache_path.display().to_string(),
            reason,
        };
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }

        let content = serde_json::to_string(self).context("Failed to serialize cache")?;

        fs::write(cache_path, content).map_err(|e| save_failed(e.to_string()))?;

        tracing::debug!("Saved embedding cache to {:?}", cache_path);
        Ok(())
    }
}
