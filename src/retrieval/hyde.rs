//! Hypothetical document generation (HyDE)
//!
//! Natural-language queries and code embeddings live in different parts of
//! the embedding space. Generating plausible code for a query first, then
//! embedding that code, lands the search closer to real implementations.

use super::prompts;
use crate::llm::{GenerationBackend, clean_code_output};
use crate::types::SearchResult;
use std::sync::Arc;

/// Characters of a description included per result in stage-two context
const CONTEXT_DESCRIPTION_CHARS: usize = 200;

/// Generates hypothetical code for a query
///
/// When disabled, or when no backend could be built, every call passes its
/// input straight through. On a failed call the generator returns `None` so
/// the caller can pick its own fallback.
pub struct HydeGenerator {
    backend: Option<Arc<dyn GenerationBackend>>,
    available: bool,
}

impl HydeGenerator {
    pub fn new(backend: Option<Arc<dyn GenerationBackend>>, enabled: bool) -> Self {
        let available = enabled && backend.is_some();
        match (&backend, enabled) {
            (Some(b), true) => tracing::info!("HyDE enabled with backend: {}", b.name()),
            (None, true) => tracing::warn!("HyDE enabled but no generation backend, disabling"),
            _ => tracing::info!("HyDE disabled"),
        }
        Self { backend, available }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    fn active_backend(&self) -> Option<&Arc<dyn GenerationBackend>> {
        if self.available {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Single-call snippet with an empty system prompt
    pub async fn generate_quick(&self, query: &str) -> Option<String> {
        let Some(backend) = self.active_backend() else {
            return Some(query.to_string());
        };
        self.call(backend.as_ref(), "", &prompts::quick_prompt(query), "quick")
            .await
    }

    /// Stage one: hypothetical code from the raw query
    pub async fn generate_stage_one(&self, query: &str) -> Option<String> {
        let Some(backend) = self.active_backend() else {
            tracing::warn!("HyDE is disabled, returning original query");
            return Some(query.to_string());
        };
        tracing::info!("Generating HyDE code (stage 1) for: {}", query);
        self.call(backend.as_ref(), prompts::HYDE_SYSTEM_PROMPT, query, "stage 1")
            .await
    }

    /// Stage two: refine the stage-one snippet using code retrieved with it
    ///
    /// `context` is cut to `max_context_chars` before it is sent.
    pub async fn generate_stage_two(
        &self,
        query: &str,
        stage_one: &str,
        context: &str,
        max_context_chars: usize,
    ) -> Option<String> {
        let Some(backend) = self.active_backend() else {
            tracing::warn!("HyDE is disabled, returning stage 1 code");
            return Some(stage_one.to_string());
        };

        let context = truncate_chars(context, max_context_chars);
        let system_prompt = prompts::stage_two_system_prompt(query, context);
        let user_message = prompts::stage_two_user_message(stage_one);
        self.call(backend.as_ref(), &system_prompt, &user_message, "stage 2")
            .await
    }

    async fn call(
        &self,
        backend: &dyn GenerationBackend,
        system_prompt: &str,
        user_message: &str,
        label: &str,
    ) -> Option<String> {
        match backend.generate(system_prompt, user_message).await {
            Ok(text) => {
                let code = clean_code_output(&text);
                if code.is_empty() {
                    tracing::warn!("HyDE {} returned no code", label);
                    return None;
                }
                tracing::info!(
                    "Generated HyDE code ({}): {}...",
                    label,
                    truncate_chars(&code, 200)
                );
                Some(code)
            }
            Err(e) => {
                tracing::error!("HyDE {} generation failed: {}", label, e);
                None
            }
        }
    }
}

/// Render the top preliminary results as stage-two context
pub fn build_stage_context(results: &[SearchResult], max_results: usize) -> String {
    let mut context = String::new();
    for result in results.iter().take(max_results) {
        context.push_str(&format!("File: {}\n", result.file_path));
        context.push_str(&format!("Name: {}\n", result.name));
        if let Some(ref description) = result.description
            && !description.is_empty()
        {
            context.push_str(&format!(
                "Description: {}\n",
                truncate_chars(description, CONTEXT_DESCRIPTION_CHARS)
            ));
        }
        context.push_str(&result.content);
        context.push_str("\n\n");
    }
    context
}

/// Longest prefix of at most `max` chars, never splitting a UTF-8 sequence
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::types::{ChunkRecord, ChunkType};
    use std::sync::Mutex;

    /// Records every prompt and replies with a fixed answer
    struct ScriptedBackend {
        reply: Result<String, ()>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedBackend {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            system_prompt: &str,
            user_message: &str,
        ) -> Result<String, GenerationError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_message.to_string()));
            self.reply
                .clone()
                .map_err(|_| GenerationError::EmptyResponse("scripted".to_string()))
        }
    }

    fn generator(backend: Arc<ScriptedBackend>) -> HydeGenerator {
        HydeGenerator::new(Some(backend as Arc<dyn GenerationBackend>), true)
    }

    #[tokio::test]
    async fn test_disabled_generator_passes_query_through() {
        let hyde = HydeGenerator::disabled();
        assert!(!hyde.is_available());
        assert_eq!(
            hyde.generate_quick("authenticate user").await.as_deref(),
            Some("authenticate user")
        );
        assert_eq!(hyde.generate_stage_one("q").await.as_deref(), Some("q"));
        assert_eq!(
            hyde.generate_stage_two("q", "def v1(): pass", "ctx", 100)
                .await
                .as_deref(),
            Some("def v1(): pass")
        );
    }

    #[tokio::test]
    async fn test_enabled_flag_off_ignores_backend() {
        let backend = ScriptedBackend::ok("def x(): pass");
        let hyde = HydeGenerator::new(Some(backend.clone() as Arc<dyn GenerationBackend>), false);
        assert!(!hyde.is_available());
        assert_eq!(hyde.generate_quick("q").await.as_deref(), Some("q"));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quick_uses_empty_system_prompt_and_cleans_output() {
        let backend = ScriptedBackend::ok("```python\ndef authenticate_user(u, p):\n    pass\n```");
        let hyde = generator(backend.clone());

        let code = hyde.generate_quick("authenticate user").await.unwrap();
        assert_eq!(code, "def authenticate_user(u, p):\n    pass");

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "");
        assert!(calls[0].1.contains("represents: authenticate user"));
    }

    #[tokio::test]
    async fn test_stage_one_sends_query_with_system_prompt() {
        let backend = ScriptedBackend::ok("def f(): pass");
        let hyde = generator(backend.clone());

        assert_eq!(hyde.generate_stage_one("hash passwords").await.as_deref(), Some("def f(): pass"));
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, prompts::HYDE_SYSTEM_PROMPT);
        assert_eq!(calls[0].1, "hash passwords");
    }

    #[tokio::test]
    async fn test_stage_two_truncates_context() {
        let backend = ScriptedBackend::ok("def g(): pass");
        let hyde = generator(backend.clone());
        let context = "x".repeat(50);

        hyde.generate_stage_two("q", "def f(): pass", &context, 10)
            .await
            .unwrap();

        let calls = backend.calls.lock().unwrap();
        assert!(calls[0].0.contains(&"x".repeat(10)));
        assert!(!calls[0].0.contains(&"x".repeat(11)));
        assert_eq!(calls[0].1, "Predict the answer to the query: def f(): pass");
    }

    #[tokio::test]
    async fn test_failures_return_none() {
        let hyde = generator(ScriptedBackend::failing());
        assert!(hyde.is_available());
        assert!(hyde.generate_quick("q").await.is_none());
        assert!(hyde.generate_stage_one("q").await.is_none());
        assert!(hyde.generate_stage_two("q", "v1", "ctx", 100).await.is_none());
    }

    #[tokio::test]
    async fn test_blank_output_is_a_failure() {
        let hyde = generator(ScriptedBackend::ok("```\n```"));
        assert!(hyde.generate_quick("q").await.is_none());
    }

    #[test]
    fn test_build_stage_context() {
        let make = |name: &str, description: Option<&str>| {
            SearchResult::from_record(
                ChunkRecord {
                    id: name.to_string(),
                    content: format!("def {}(): pass", name),
                    chunk_type: ChunkType::Function,
                    name: name.to_string(),
                    parent_name: None,
                    file_path: format!("src/{}.py", name),
                    language: "python".to_string(),
                    line_start: 1,
                    line_end: 1,
                    description: description.map(str::to_string),
                },
                0.9,
            )
        };
        let results = vec![
            make("login", Some("Logs a user in")),
            make("logout", None),
            make("ignored", None),
        ];

        let context = build_stage_context(&results, 2);
        assert!(context.contains("File: src/login.py\nName: login\nDescription: Logs a user in\ndef login(): pass"));
        assert!(context.contains("Name: logout\ndef logout(): pass"));
        assert!(!context.contains("ignored"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("사용자 인증", 3), "사용자");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
