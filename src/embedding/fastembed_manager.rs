use super::{EmbeddingIntent, EmbeddingProvider};
use crate::error::EmbeddingError;
use anyhow::Result;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Instruction BGE models expect in front of retrieval queries
const BGE_QUERY_INSTRUCTION: &str = "Represent this sentence for searching relevant passages: ";

/// How a model family wants query and document text prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStyle {
    /// `query: ` / `passage: ` prefixes
    E5,
    /// Instruction prefix on queries only
    Bge,
    Symmetric,
}

impl PromptStyle {
    fn prepare(self, text: String, intent: EmbeddingIntent) -> String {
        match (self, intent) {
            (PromptStyle::E5, EmbeddingIntent::Query) => format!("query: {}", text),
            (PromptStyle::E5, EmbeddingIntent::Document) => format!("passage: {}", text),
            (PromptStyle::Bge, EmbeddingIntent::Query) => {
                format!("{}{}", BGE_QUERY_INSTRUCTION, text)
            }
            _ => text,
        }
    }
}

/// Models this provider knows how to load: (config names, model, dimension, prompt style)
static KNOWN_MODELS: &[(&[&str], EmbeddingModel, usize, PromptStyle)] = &[
    (
        &["intfloat/multilingual-e5-small", "multilingual-e5-small"],
        EmbeddingModel::MultilingualE5Small,
        384,
        PromptStyle::E5,
    ),
    (
        &["intfloat/multilingual-e5-base", "multilingual-e5-base"],
        EmbeddingModel::MultilingualE5Base,
        768,
        PromptStyle::E5,
    ),
    (
        &["BAAI/bge-small-en-v1.5", "bge-small-en-v1.5"],
        EmbeddingModel::BGESmallENV15,
        384,
        PromptStyle::Bge,
    ),
    (
        &["BAAI/bge-base-en-v1.5", "bge-base-en-v1.5"],
        EmbeddingModel::BGEBaseENV15,
        768,
        PromptStyle::Bge,
    ),
    (
        &["sentence-transformers/all-MiniLM-L6-v2", "all-MiniLM-L6-v2"],
        EmbeddingModel::AllMiniLML6V2,
        384,
        PromptStyle::Symmetric,
    ),
    (
        &["sentence-transformers/all-MiniLM-L12-v2", "all-MiniLM-L12-v2"],
        EmbeddingModel::AllMiniLML12V2,
        384,
        PromptStyle::Symmetric,
    ),
];

fn lookup(
    name: &str,
) -> Option<&'static (&'static [&'static str], EmbeddingModel, usize, PromptStyle)> {
    KNOWN_MODELS
        .iter()
        .find(|(names, ..)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

/// FastEmbed-based local embedding provider (ONNX runtime)
pub struct FastEmbedManager {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
    style: PromptStyle,
}

impl FastEmbedManager {
    /// Create a new FastEmbedManager with the default model (multilingual-e5-small)
    pub fn new() -> Result<Self> {
        Self::from_model_name("intfloat/multilingual-e5-small")
    }

    /// Whether `name` refers to a model this provider can load
    pub fn is_supported(name: &str) -> bool {
        lookup(name).is_some()
    }

    /// Create a FastEmbedManager for a configured model name
    pub fn from_model_name(name: &str) -> Result<Self> {
        let (names, model, dimension, style) =
            lookup(name).ok_or_else(|| EmbeddingError::UnknownModel(name.to_string()))?;

        tracing::info!("Initializing FastEmbed model: {} ({} dims)", names[0], dimension);

        let options = InitOptions::new(model.clone()).with_show_download_progress(true);
        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(format!("{}: {}", names[0], e)))?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            model_name: names[0].to_string(),
            dimension: *dimension,
            style: *style,
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>, intent: EmbeddingIntent) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!(
            "Generating {} embeddings for {} texts",
            intent.as_str(),
            texts.len()
        );

        let prepared: Vec<String> = texts
            .into_iter()
            .map(|t| self.style.prepare(t, intent))
            .collect();

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;
        let embeddings = model
            .embed(prepared, None)
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e5_prefixes() {
        assert_eq!(
            PromptStyle::E5.prepare("parse json".to_string(), EmbeddingIntent::Query),
            "query: parse json"
        );
        assert_eq!(
            PromptStyle::E5.prepare("fn parse()".to_string(), EmbeddingIntent::Document),
            "passage: fn parse()"
        );
    }

    #[test]
    fn test_bge_prefixes_queries_only() {
        assert!(
            PromptStyle::Bge
                .prepare("parse json".to_string(), EmbeddingIntent::Query)
                .starts_with(BGE_QUERY_INSTRUCTION)
        );
        assert_eq!(
            PromptStyle::Bge.prepare("fn parse()".to_string(), EmbeddingIntent::Document),
            "fn parse()"
        );
    }

    #[test]
    fn test_symmetric_models_ignore_intent() {
        assert_eq!(
            PromptStyle::Symmetric.prepare("x".to_string(), EmbeddingIntent::Query),
            "x"
        );
    }

    #[test]
    fn test_model_lookup() {
        assert!(FastEmbedManager::is_supported("intfloat/multilingual-e5-small"));
        assert!(FastEmbedManager::is_supported("all-minilm-l6-v2"));
        assert!(!FastEmbedManager::is_supported("text-embedding-3-large"));

        let (_, _, dimension, style) = lookup("BAAI/bge-base-en-v1.5").unwrap();
        assert_eq!(*dimension, 768);
        assert_eq!(*style, PromptStyle::Bge);
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let err = FastEmbedManager::from_model_name("no-such-model").err().unwrap();
        assert!(err.to_string().contains("no-such-model"));
    }

    // Downloads the model on first run
    #[test]
    #[ignore]
    fn test_embedding_generation() {
        let manager = FastEmbedManager::new().unwrap();
        let texts = vec![
            "def authenticate_user(name, password): ...".to_string(),
            "pub struct Vector { x: f32, y: f32 }".to_string(),
        ];

        let embeddings = manager
            .embed_batch(texts, EmbeddingIntent::Document)
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), manager.dimension());
        assert!(manager.embed_batch(vec![], EmbeddingIntent::Query).unwrap().is_empty());
    }
}
