use super::{GenerationBackend, GenerationOptions};
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};

const NAME: &str = "openai";

/// OpenAI-compatible chat completions backend
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    options: GenerationOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        options: GenerationOptions,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            options,
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, system_prompt: &'a str, user_message: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_message,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }
}

fn extract_text(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
}

#[async_trait::async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError> {
        let request = self.request(system_prompt, user_message);
        tracing::debug!("OpenAI request to model {}", self.model);

        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::RequestFailed {
                backend: NAME.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::HttpStatus {
                backend: NAME.to_string(),
                status,
                body,
            });
        }

        let body: ChatResponse =
            resp.json()
                .await
                .map_err(|e| GenerationError::RequestFailed {
                    backend: NAME.to_string(),
                    reason: format!("invalid response body: {}", e),
                })?;

        extract_text(body).ok_or_else(|| GenerationError::EmptyResponse(NAME.to_string()))
    }
}
