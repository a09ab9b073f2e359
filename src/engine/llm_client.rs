use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ApiKey, ServiceSettings};
use crate::error::ProviderError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".into(),
        }
    }
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
pub struct CompletionChoice {
    pub message: Option<ChatMessageResponse>,
}

#[derive(Deserialize)]
pub struct ChatMessageResponse {
    pub content: Option<String>,
}

/// The two calls the story provider makes against a generation service.
pub trait CompletionClient {
    /// Cheap liveness check. `Err` carries a short reason for logging.
    fn probe(&self, endpoint: &str) -> Result<(), String>;

    /// One chat completion; returns the text of the first choice.
    fn complete(
        &self,
        endpoint: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, ProviderError>;
}

/// OpenAI-compatible HTTP client (LM Studio, Groq and friends).
pub struct LmStudioClient {
    probe_client: Client,
    client: Client,
    probe_path: String,
    api_key: Option<ApiKey>,
}

impl LmStudioClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, ProviderError> {
        let build_err = |e: reqwest::Error| ProviderError::Transport(e.to_string());

        let probe_client = Client::builder()
            .timeout(Duration::from_millis(settings.probe_timeout_ms))
            .build()
            .map_err(build_err)?;

        // The generation round trip is allowed to take as long as it takes.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(build_err)?;

        Ok(Self {
            probe_client,
            client,
            probe_path: settings.probe_path.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

impl CompletionClient for LmStudioClient {
    fn probe(&self, endpoint: &str) -> Result<(), String> {
        let resp = self
            .probe_client
            .head(format!("{endpoint}{}", self.probe_path))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", resp.status().as_u16()))
        }
    }

    fn complete(
        &self,
        endpoint: &str,
        request: &ChatCompletionRequest,
    ) -> Result<String, ProviderError> {
        let mut req = self
            .client
            .post(format!("{endpoint}/v1/chat/completions"))
            .header("Accept", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose());
        }

        let resp = req
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                detail: api_error_detail(&body),
            });
        }

        extract_completion(&body)
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
pub fn api_error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| match &v["error"] {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(obj.clone()).to_string())),
        _ => None,
    });

    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => "Unknown API error".to_string(),
        None => body.trim().to_string(),
    }
}

/// Text of `choices[0].message.content`, trimmed and without a leading byte-order mark.
pub fn extract_completion(body: &str) -> Result<String, ProviderError> {
    let resp: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|content| {
            content
                .trim()
                .trim_start_matches('\u{feff}')
                .trim_start()
                .to_string()
        })
        .ok_or_else(|| {
            ProviderError::UnexpectedResponse(
                "the API response did not contain choices[0].message.content".into(),
            )
        })
}
