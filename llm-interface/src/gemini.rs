use crate::provider::{Generation, TextGenerator, TokenUsage};
use async_trait::async_trait;
use radar_core::{CoreError, LlmError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default = "Vec::new")]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

/// Text generation through the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerator {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host. Used in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, CoreError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("requesting generation from {}", self.model);
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("network error calling {}: {}", PROVIDER, e);
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: PROVIDER.to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("{} returned status {}", PROVIDER, status);
            return Err(match status.as_u16() {
                401 | 403 => CoreError::Llm(LlmError::InvalidApiKey {
                    provider: PROVIDER.to_string(),
                }),
                429 => CoreError::Llm(LlmError::RateLimitExceeded {
                    provider: PROVIDER.to_string(),
                    retry_after: 60,
                }),
                code if code >= 500 => CoreError::Llm(LlmError::ServiceUnavailable {
                    provider: PROVIDER.to_string(),
                }),
                code => CoreError::Llm(LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    status: code,
                }),
            });
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("failed to parse {} response: {}", PROVIDER, e);
            CoreError::Llm(LlmError::ParseFailure {
                details: format!("malformed {PROVIDER} response"),
            })
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CoreError::Llm(LlmError::EmptyResponse {
                provider: PROVIDER.to_string(),
            }));
        }

        let usage = body.usage_metadata.map(|usage| TokenUsage {
            prompt_units: usage.prompt_token_count,
            completion_units: usage.candidates_token_count,
        });

        Ok(Generation { text, usage })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decoding_extracts_text_and_usage() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"mentioned\": true}"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30, "totalTokenCount": 150}
        }"#;

        let body: GenerateContentResponse = serde_json::from_str(raw).expect("response parses");
        let usage = body.usage_metadata.expect("usage present");
        assert_eq!(usage.prompt_token_count, 120);
        assert_eq!(usage.candidates_token_count, 30);
        assert_eq!(
            body.candidates[0].content.as_ref().unwrap().parts[0].text,
            "{\"mentioned\": true}"
        );
    }

    #[test]
    fn response_decoding_tolerates_missing_fields() {
        let body: GenerateContentResponse =
            serde_json::from_str("{}").expect("empty response parses");
        assert!(body.candidates.is_empty());
        assert!(body.usage_metadata.is_none());
    }
}
