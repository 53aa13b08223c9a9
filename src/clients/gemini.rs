use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::traits::{BackendError, GenerationBackend, GenerationRequest};
use crate::config::Config;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const ERROR_BODY_CAP: usize = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Gemini `generateContent` REST endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout_ms: Option<u64>,
    ) -> Result<Self, BackendError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BackendError::MissingApiKey);
        }
        let mut builder = Client::builder();
        if let Some(ms) = timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let api_key = config
            .runtime
            .api_key
            .clone()
            .ok_or(BackendError::MissingApiKey)?;
        Self::new(
            api_key,
            config.provider.api_base.clone(),
            config.provider.request_timeout_ms,
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base,
            model.trim_start_matches("models/")
        )
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let body = GenerateContentBody {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.schema,
            },
        };

        tracing::debug!(
            "Calling Gemini generateContent (model={}, prompt_chars={})",
            request.model,
            request.prompt.len()
        );

        let resp = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Provider {
                status: status.as_u16(),
                message: provider_message(&body_text),
            });
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to decode Gemini reply: {}", e)))?;

        extract_text(parsed)
    }
}

/// Prefer the structured `error.message` from a Gemini error body
fn provider_message(body: &str) -> String {
    if let Ok(val) = serde_json::from_str::<Value>(body)
        && let Some(msg) = val
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
    {
        return msg.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(ERROR_BODY_CAP).collect()
    }
}

fn extract_text(resp: GenerateContentResponse) -> Result<String, BackendError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::EmptyReply("Gemini returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "unspecified".to_string());
        return Err(BackendError::EmptyReply(format!(
            "Gemini returned no text (finish reason: {})",
            reason
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_shape_carries_schema_and_mime_type() {
        let schema = json!({"type": "OBJECT"});
        let body = GenerateContentBody {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &schema,
            },
        };
        let val = serde_json::to_value(&body).expect("serializes");
        assert_eq!(val["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(val["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(val["generationConfig"]["responseSchema"], schema);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\""}, {"text": ": 1}"}]}}]
        }))
        .expect("decodes");
        assert_eq!(extract_text(resp).expect("text"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_text_reports_finish_reason() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .expect("decodes");
        let err = extract_text(resp).expect_err("no text");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_provider_message_prefers_error_field() {
        let body = r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(provider_message(body), "API key not valid");
        assert_eq!(provider_message("  "), "no response body");
        assert_eq!(provider_message("gateway down"), "gateway down");
    }

    #[test]
    fn test_endpoint_accepts_prefixed_model() {
        let client = GeminiClient::new("k", "http://localhost:9/", None).expect("client");
        assert_eq!(
            client.endpoint("models/gemini-2.5-flash"),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_blank_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  ", DEFAULT_API_BASE, None),
            Err(BackendError::MissingApiKey)
        ));
    }
}
