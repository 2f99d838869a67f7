use super::{GenerationBackend, GenerationOptions};
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const NAME: &str = "gemini";

/// Google Gemini `generateContent` backend
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    options: GenerationOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiBackend {
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
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request<'a>(&self, system_prompt: &'a str, user_message: &'a str) -> GenerateRequest<'a> {
        // Flash models spend output tokens on thinking unless told not to,
        // which starves short answers such as a yes/no judgement
        let thinking_config = self
            .model
            .contains("flash")
            .then_some(ThinkingConfig { thinking_budget: 0 });

        let system_instruction = (!system_prompt.trim().is_empty()).then(|| Content {
            role: None,
            parts: vec![RequestPart {
                text: system_prompt,
            }],
        });

        GenerateRequest {
            system_instruction,
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart { text: user_message }],
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_tokens,
                thinking_config,
            },
        }
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait::async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, GenerationError> {
        let request = self.request(system_prompt, user_message);
        tracing::debug!("Gemini request to model {}", self.model);

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
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

        let body: GenerateResponse =
            resp.json()
                .await
                .map_err(|e| GenerationError::RequestFailed {
                    backend: NAME.to_string(),
                    reason: format!("invalid response body: {}", e),
                })?;

        extract_text(body).ok_or_else(|| GenerationError::EmptyResponse(NAME.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(model: &str) -> GeminiBackend {
        GeminiBackend::new(
            reqwest::Client::new(),
            "https://example.test/v1beta/",
            "key",
            model,
            GenerationOptions::new(0.3, 500),
        )
    }

    #[test]
    fn test_url() {
        assert_eq!(
            backend("gemini-2.5-flash").url(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(backend("gemini-2.5-flash").request("sys", "user")).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
        assert_eq!(
            json["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            0
        );
    }

    #[test]
    fn test_request_omits_empty_system_instruction() {
        let json = serde_json::to_value(backend("gemini-2.5-flash").request("", "u")).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_request_without_thinking_config() {
        let json = serde_json::to_value(backend("gemini-2.5-pro").request("s", "u")).unwrap();
        assert!(json["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn test_extract_text() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"def a():"},{"text":" pass"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).as_deref(), Some("def a(): pass"));
    }

    #[test]
    fn test_extract_text_empty() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(response).is_none());

        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(extract_text(response).is_none());
    }
}
