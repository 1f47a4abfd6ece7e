//! AI-assisted diagram generation through an OpenAI-compatible endpoint.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{AiAuth, AiConfig};
use crate::util::{compact_text, is_http_url, trim_url};

const SYSTEM_PROMPT: &str = "You are a Mermaid diagram assistant. Reply with valid Mermaid \
code for the user's description and nothing else: no explanations, no prose.";
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Invalid AI configuration: {0}")]
    InvalidConfiguration(String),
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI API error: {0}")]
    Api(String),
    #[error("AI response did not contain any text")]
    EmptyResponse,
}

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Clone)]
pub struct AiClient {
    endpoint: String,
    api_key: String,
    model: String,
    auth: AiAuth,
    client: reqwest::Client,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl AiClient {
    /// Build a client from configuration. `base_url` is the full
    /// chat-completions endpoint.
    pub fn from_config(config: &AiConfig) -> AiResult<Self> {
        let (Some(endpoint), Some(api_key), Some(model)) =
            (&config.base_url, &config.api_key, &config.model)
        else {
            return Err(AiError::InvalidConfiguration(
                "endpoint URL, API key, and model are all required".to_string(),
            ));
        };
        if !is_http_url(endpoint) {
            return Err(AiError::InvalidConfiguration(
                "endpoint must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            endpoint: trim_url(endpoint).to_string(),
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            auth: config.auth,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    /// Ask the model for a diagram and return bare Mermaid source.
    pub async fn generate(&self, prompt: &str) -> AiResult<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AiError::InvalidConfiguration(
                "prompt must not be empty".to_string(),
            ));
        }

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match self.auth {
            AiAuth::Bearer => request.bearer_auth(&self.api_key),
            AiAuth::ApiKey => request.header("x-api-key", &self.api_key),
        };
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(format_api_error(status, &body)));
        }

        let payload = response.json::<Value>().await?;
        let text = extract_content(&payload).ok_or(AiError::EmptyResponse)?;
        let code = clean_mermaid_code(&text);
        if code.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        tracing::debug!("Generated {} bytes of Mermaid", code.len());
        Ok(code)
    }
}

/// Pull the reply text out of the common chat API response shapes.
#[must_use]
pub fn extract_content(payload: &Value) -> Option<String> {
    let candidates = [
        // OpenAI
        payload.pointer("/choices/0/message/content"),
        // Anthropic
        payload.pointer("/content/0/text"),
        // Gemini
        payload.pointer("/candidates/0/content/parts/0/text"),
        payload.get("text"),
        payload.get("content"),
        Some(payload),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("Invalid regex")
    })
}

/// Strip a surrounding Markdown code fence (```` ```mermaid ```` or bare).
#[must_use]
pub fn clean_mermaid_code(text: &str) -> String {
    let trimmed = text.trim();
    fence_regex()
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map_or(trimmed, |inner| inner.as_str())
        .trim()
        .to_string()
}

fn format_api_error(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|payload| {
        payload
            .pointer("/error/message")
            .or_else(|| payload.get("message"))
            .or_else(|| payload.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match message {
        Some(message) => format!("{message} ({})", status.as_u16()),
        None if compact_text(body).is_empty() => format!("HTTP {}", status.as_u16()),
        None => format!("{} ({})", compact_text(body), status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config(base_url: String, auth: AiAuth) -> AiConfig {
        AiConfig {
            base_url: Some(base_url),
            api_key: Some("sk-test".to_string()),
            model: Some("gpt-4o-mini".to_string()),
            auth,
        }
    }

    #[test]
    fn extracts_text_from_known_shapes() {
        let openai = json!({ "choices": [{ "message": { "content": "graph TD" } }] });
        let anthropic = json!({ "content": [{ "type": "text", "text": "graph LR" }] });
        let gemini = json!({ "candidates": [{ "content": { "parts": [{ "text": "pie" }] } }] });
        let plain = json!({ "text": "flowchart TB" });
        let bare = json!("sequenceDiagram");

        assert_eq!(extract_content(&openai).as_deref(), Some("graph TD"));
        assert_eq!(extract_content(&anthropic).as_deref(), Some("graph LR"));
        assert_eq!(extract_content(&gemini).as_deref(), Some("pie"));
        assert_eq!(extract_content(&plain).as_deref(), Some("flowchart TB"));
        assert_eq!(extract_content(&bare).as_deref(), Some("sequenceDiagram"));
        assert_eq!(extract_content(&json!({ "id": 1 })), None);
    }

    #[test]
    fn strips_code_fences() {
        assert_eq!(
            clean_mermaid_code("```mermaid\ngraph TD\n  A-->B\n```"),
            "graph TD\n  A-->B"
        );
        assert_eq!(clean_mermaid_code("```\npie\n```\n"), "pie");
        assert_eq!(clean_mermaid_code("  graph TD  "), "graph TD");
    }

    #[test]
    fn from_config_requires_all_fields() {
        let missing_model = AiConfig {
            model: None,
            ..config("https://api.example.com/v1/chat/completions".to_string(), AiAuth::Bearer)
        };
        assert!(matches!(
            AiClient::from_config(&missing_model),
            Err(AiError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn generate_posts_chat_request_with_bearer_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{ "model": "gpt-4o-mini", "max_tokens": 2000 }"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "```mermaid\ngraph TD\n  A-->B\n```" } }]
                }));
            })
            .await;

        let client =
            AiClient::from_config(&config(server.url("/v1/chat/completions"), AiAuth::Bearer))
                .unwrap();
        let code = client.generate("a two step flow").await.unwrap();

        mock.assert_async().await;
        assert_eq!(code, "graph TD\n  A-->B");
    }

    #[tokio::test]
    async fn generate_uses_api_key_header_and_reports_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat").header("x-api-key", "sk-test");
                then.status(429)
                    .json_body(json!({ "error": { "message": "rate limited" } }));
            })
            .await;

        let client = AiClient::from_config(&config(server.url("/chat"), AiAuth::ApiKey)).unwrap();
        let error = client.generate("anything").await.unwrap_err();

        assert!(matches!(error, AiError::Api(ref message) if message == "rate limited (429)"));
    }
}
