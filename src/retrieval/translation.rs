//! Query translation for description search
//!
//! Descriptions are indexed in English, so a Korean query is translated before
//! it is embedded. Translation is best effort: any failure returns the input.

use crate::llm::GenerationBackend;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex};

const TRANSLATION_INSTRUCTION: &str = "You translate Korean code-search queries into natural English.

Rules:
- Keep programming terms, identifiers and library names in English as they are
- Be concise; the result is used as a search query
- Return only the English translation, without explanations or quotes";

// Hangul syllables, jamo and compatibility jamo
static HANGUL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{AC00}-\x{D7A3}\x{1100}-\x{11FF}\x{3130}-\x{318F}]")
        .expect("valid hangul pattern")
});

/// True when the text contains Korean script
pub fn contains_hangul(text: &str) -> bool {
    HANGUL.is_match(text)
}

#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    fn is_available(&self) -> bool;

    /// Translate to English, returning the input unchanged when no translation applies
    async fn translate(&self, text: &str) -> String;
}

/// Translator used when none is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

#[async_trait::async_trait]
impl Translator for PassthroughTranslator {
    fn is_available(&self) -> bool {
        false
    }

    async fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Insertion-ordered cache that drops its oldest half once over capacity
#[derive(Debug, Default)]
struct TranslationCache {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
    max_entries: usize,
}

impl TranslationCache {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: String) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }

        if self.entries.len() > self.max_entries {
            let evict = self.max_entries / 2;
            for old in self.order.drain(..evict.min(self.order.len())) {
                self.entries.remove(&old);
            }
            tracing::info!("Translation cache pruned to {} entries", self.entries.len());
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Translates Korean queries with a generation backend
pub struct LlmTranslator {
    backend: Option<Arc<dyn GenerationBackend>>,
    available: bool,
    cache: Mutex<TranslationCache>,
}

impl LlmTranslator {
    pub fn new(
        backend: Option<Arc<dyn GenerationBackend>>,
        enabled: bool,
        cache_max_entries: usize,
    ) -> Self {
        let available = enabled && backend.is_some();
        if enabled && !available {
            tracing::warn!("Translation enabled but no generation backend, disabling");
        }
        Self {
            backend,
            available,
            cache: Mutex::new(TranslationCache::new(cache_max_entries)),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            let previous = cache.len();
            cache.clear();
            tracing::info!("Translation cache cleared ({} entries removed)", previous);
        }
    }

    fn cached(&self, text: &str) -> Option<String> {
        self.cache.lock().ok().and_then(|c| c.get(text))
    }

    fn remember(&self, text: &str, translated: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), translated.to_string());
        }
    }
}

#[async_trait::async_trait]
impl Translator for LlmTranslator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn translate(&self, text: &str) -> String {
        if text.trim().is_empty() || !contains_hangul(text) {
            return text.to_string();
        }
        let Some(backend) = self.backend.as_ref().filter(|_| self.available) else {
            return text.to_string();
        };

        if let Some(hit) = self.cached(text) {
            tracing::debug!("Using cached translation for: {}", text);
            return hit;
        }

        match backend.generate(TRANSLATION_INSTRUCTION, text).await {
            Ok(answer) => {
                let translated = answer.trim().trim_matches('"').trim().to_string();
                if translated.is_empty() {
                    return text.to_string();
                }
                tracing::info!("Translated query '{}' -> '{}'", text, translated);
                self.remember(text, &translated);
                translated
            }
            Err(e) => {
                tracing::warn!("Query translation failed, using original: {}", e);
                text.to_string()
            }
        }
    }
}
