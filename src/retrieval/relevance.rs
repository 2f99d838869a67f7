use super::hyde::truncate_chars;
use crate::llm::GenerationBackend;
use crate::types::SearchResult;
use std::sync::Arc;

/// Decides whether a single result answers a query
#[async_trait::async_trait]
pub trait RelevanceJudge: Send + Sync {
    fn is_available(&self) -> bool;

    async fn judge(&self, query: &str, result: &SearchResult) -> bool;
}

/// Yes/no relevance judgement from a generation backend
///
/// Any failure counts as "not relevant".
pub struct LlmRelevanceJudge {
    backend: Option<Arc<dyn GenerationBackend>>,
    available: bool,
    max_code_chars: usize,
}

impl LlmRelevanceJudge {
    pub fn new(
        backend: Option<Arc<dyn GenerationBackend>>,
        enabled: bool,
        max_code_chars: usize,
    ) -> Self {
        let available = enabled && backend.is_some();
        if let Some(ref b) = backend
            && available
        {
            tracing::info!("Relevance judge initialized with backend: {}", b.name());
        } else if enabled {
            tracing::warn!("Relevance judging enabled but no generation backend, disabling");
        }
        Self {
            backend,
            available,
            max_code_chars,
        }
    }

    pub fn prompt(&self, query: &str, result: &SearchResult) -> String {
        let description = match result.description.as_deref() {
            Some(d) if !d.is_empty() => format!("\n\nDescription: {}", d),
            _ => String::new(),
        };

        format!(
            "You are a code search relevance judge. Determine if the following code is relevant to the user's query.

User Query: {query}

Code Type: {chunk_type}
Code Name: {name}{description}

Code:
```
{code}
```

Question: Does this code satisfy the user's query? Would this code be useful for answering their question?

Answer with ONLY \"Yes\" or \"No\". No explanation needed.",
            chunk_type = result.chunk_type,
            name = result.name,
            code = truncate_chars(&result.content, self.max_code_chars),
        )
    }
}

fn parse_judgement(answer: &str) -> bool {
    answer.to_lowercase().contains("yes")
}

#[async_trait::async_trait]
impl RelevanceJudge for LlmRelevanceJudge {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn judge(&self, query: &str, result: &SearchResult) -> bool {
        let Some(backend) = self.backend.as_ref().filter(|_| self.available) else {
            tracing::warn!("Relevance judge not available, assuming not relevant");
            return false;
        };

        match backend.generate("", &self.prompt(query, result)).await {
            Ok(answer) => {
                let relevant = parse_judgement(&answer);
                tracing::info!("Relevance judgement for '{}': {}", result.name, relevant);
                relevant
            }
            Err(e) => {
                tracing::error!("Error judging relevance: {}", e);
                false
            }
        }
    }
}
