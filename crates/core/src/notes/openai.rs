//! OpenAI-compatible chat-completions client.

use super::generator::{CompletionRequest, GeneratorError, TextGenerator};
use crate::{EhrError, EhrResult, LlmConfig, NonEmptyText};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Longest slice of an error body kept in a `GeneratorError`.
const ERROR_BODY_LIMIT: usize = 300;

pub struct OpenAiClient {
    api_key: NonEmptyText,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Create a client for `cfg`.
    ///
    /// Returns `Ok(None)` when no API key is configured.
    ///
    /// # Errors
    ///
    /// Returns `EhrError::HttpClient` if the underlying HTTP client cannot be built.
    pub fn from_config(cfg: &LlmConfig) -> EhrResult<Option<Self>> {
        let Some(api_key) = cfg.api_key() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(EhrError::HttpClient)?;

        Ok(Some(Self {
            api_key: api_key.clone(),
            base_url: cfg.base_url().trim_end_matches('/').to_string(),
            client,
        }))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Map a non-success HTTP status to a classified failure.
pub fn classify_status(status: StatusCode, body: &str) -> GeneratorError {
    let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GeneratorError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => GeneratorError::RateLimited(detail),
        _ => GeneratorError::Other(detail),
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
pub fn parse_completion(json: &Value) -> Result<String, GeneratorError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GeneratorError::Other("missing choices[0].message.content".to_string()))
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Other("request timed out".to_string())
                } else if e.is_connect() {
                    GeneratorError::Other(format!("cannot reach {}", self.base_url))
                } else {
                    GeneratorError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| GeneratorError::Other(format!("invalid completion payload: {e}")))?;
        parse_completion(&json)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_api_key_means_no_client() {
        let client = OpenAiClient::from_config(&LlmConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn client_uses_configured_base_url() {
        let cfg = LlmConfig::new(NonEmptyText::optional(Some("sk-test")))
            .with_base_url("http://localhost:9999/v1/")
            .unwrap();

        let client = OpenAiClient::from_config(&cfg).unwrap().unwrap();

        assert_eq!(client.base_url(), "http://localhost:9999/v1");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            GeneratorError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            GeneratorError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GeneratorError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "<html>"),
            GeneratorError::Other(_)
        ));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(5_000);
        let GeneratorError::Other(detail) = classify_status(StatusCode::INTERNAL_SERVER_ERROR, &body)
        else {
            panic!("expected Other");
        };
        assert!(detail.len() < 400);
        assert!(detail.starts_with("HTTP 500"));
    }

    #[test]
    fn parse_completion_extracts_trimmed_content() {
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  {\"clinical_note\": \"X\"}\n"}}]
        });
        assert_eq!(parse_completion(&raw).unwrap(), "{\"clinical_note\": \"X\"}");
    }

    #[test]
    fn parse_completion_without_choices_fails() {
        let raw = serde_json::json!({"error": {"message": "nope"}});
        assert!(matches!(
            parse_completion(&raw),
            Err(GeneratorError::Other(_))
        ));
    }
}
