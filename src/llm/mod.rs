//! Text generation backends
//!
//! HyDE, query translation and relevance judging all need the same capability:
//! given a system prompt and a user message, produce text. Gemini and any
//! OpenAI-compatible endpoint are interchangeable behind [`GenerationBackend`].

mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::GenerationError;
use std::sync::Arc;
use std::time::Duration;

/// Sampling settings fixed per consumer (HyDE, judge, translator)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short backend identifier used in logs and errors
    fn name(&self) -> &str;

    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError>;
}

/// Build the configured backend, or None when its API key is missing
pub fn build_backend(
    config: &LlmConfig,
    options: GenerationOptions,
) -> Option<Arc<dyn GenerationBackend>> {
    let Some(api_key) = config.active_api_key() else {
        tracing::info!(
            "No API key configured for '{}', generation backend disabled",
            config.provider
        );
        return None;
    };

    let client = match http_client(config.timeout_secs) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {}", e);
            return None;
        }
    };

    let backend: Arc<dyn GenerationBackend> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiBackend::new(
            client,
            &config.openai_base_url,
            api_key,
            &config.openai_model,
            options,
        )),
        _ => Arc::new(GeminiBackend::new(
            client,
            gemini::DEFAULT_BASE_URL,
            api_key,
            &config.gemini_model,
            options,
        )),
    };
    Some(backend)
}

fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder.build()
}

/// Strip surrounding whitespace and a markdown code fence from generated text
///
/// A leading fence line (with or without a language tag) is dropped, and the last
/// line is dropped too when it is a closing fence.
pub fn clean_code_output(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_code_output_strips_fences() {
        let raw = "```python\ndef authenticate(user):\n    return True\n```";
        assert_eq!(
            clean_code_output(raw),
            "def authenticate(user):\n    return True"
        );
    }

    #[test]
    fn test_clean_code_output_without_language_tag() {
        assert_eq!(clean_code_output("```\nx = 1\n```\n"), "x = 1");
    }

    #[test]
    fn test_clean_code_output_unterminated_fence() {
        assert_eq!(clean_code_output("```rust\nfn main() {}"), "fn main() {}");
    }

    #[test]
    fn test_clean_code_output_plain_text() {
        assert_eq!(clean_code_output("  def f(): pass \n"), "def f(): pass");
        assert_eq!(clean_code_output(""), "");
    }

    #[test]
    fn test_build_backend_requires_api_key() {
        let config = LlmConfig::default();
        assert!(build_backend(&config, GenerationOptions::new(0.3, 500)).is_none());
    }

    #[test]
    fn test_build_backend_selects_provider() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let backend = build_backend(&config, GenerationOptions::new(0.1, 10)).unwrap();
        assert_eq!(backend.name(), "openai");

        let config = LlmConfig {
            gemini_api_key: Some("g-test".to_string()),
            ..LlmConfig::default()
        };
        let backend = build_backend(&config, GenerationOptions::new(0.1, 10)).unwrap();
        assert_eq!(backend.name(), "gemini");
    }
}
