//! Chat assistant proxy.
//!
//! The server forwards a rider's question plus a fixed system prompt to a
//! generative text backend and relays the first text it finds in the
//! response. The backend sits behind [`ChatModel`] so handlers and tests
//! never depend on the HTTP client directly.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;

pub const SYSTEM_PROMPT: &str = "You are the SafeBus assistant. You help parents, students and \
school bus drivers with questions about bus tracking, pick-up and drop-off status, attendance, \
lost and found items and safety alerts. Answer briefly and politely. If a question needs live \
data you do not have, tell the user where to find it in the SafeBus app.";

const USER_AGENT: &str = "safebus-backend/1.0";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("bad_request")]
    BadRequest,
    #[error("missing_api_key")]
    MissingApiKey,
    #[error("upstream_error")]
    Upstream(String),
    #[error("empty_reply")]
    EmptyReply,
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::BadRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        if let ChatError::Upstream(detail) = &self {
            tracing::error!(%detail, "chat backend request failed");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Generative text backend. Returns the raw JSON response body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, system_prompt: &str, message: &str) -> Result<Value, ChatError>;
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.gemini_api_key.clone().filter(|_| config.has_gemini_key())
        else {
            return Ok(None);
        };
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.chat_timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize HTTP client: {}", e))?;
        Ok(Some(Self {
            client,
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key,
        }))
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, system_prompt: &str, message: &str) -> Result<Value, ChatError> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": message }] }],
        });
        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let preview: String = text.chars().take(200).collect();
            return Err(ChatError::Upstream(format!("HTTP {status}: {preview}")));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))
    }
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// First non-blank text in a backend response. Gemini's candidate parts are
/// checked first, then the shapes other chat backends use.
pub fn extract_reply(response: &Value) -> Option<String> {
    let from_parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(|part| text_at(part, "/text")));

    from_parts
        .or_else(|| {
            [
                "/reply",
                "/message",
                "/replies/0",
                "/messages/0",
                "/choices/0/message/content",
            ]
            .into_iter()
            .find_map(|pointer| text_at(response, pointer))
        })
        .map(str::to_string)
}

#[derive(Clone)]
pub struct ChatService {
    model: Option<Arc<dyn ChatModel>>,
}

impl ChatService {
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { model }
    }

    pub async fn reply(&self, message: Option<&str>) -> Result<String, ChatError> {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(ChatError::BadRequest)?;
        let model = self.model.as_ref().ok_or(ChatError::MissingApiKey)?;

        let response = model.generate(SYSTEM_PROMPT, message).await?;
        let reply = extract_reply(&response).ok_or(ChatError::EmptyReply)?;
        tracing::debug!(reply_len = reply.len(), "chat reply relayed");
        Ok(reply)
    }
}
