use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use shared_types::{AiChatReply, AiChatRequest, EmergencyRequest, LaneId, StatusSnapshot};
use thiserror::Error;

use crate::config::SyncConfig;
use crate::sync::TrafficBackend;

/// Any failure talking to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to serialize request: {0}")]
    Encode(String),
    #[error("HTTP error: {status}{}", with_parens(.message))]
    Status { status: u16, message: Option<String> },
    #[error("failed to parse JSON: {0}")]
    Decode(String),
}

fn with_parens(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

impl ApiError {
    /// Human-readable message supplied by the controller, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Builds a status error from a non-2xx body, picking up `error` or `message`.
pub fn error_from_body(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .or_else(|| json.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty());

    ApiError::Status { status, message }
}

/// A 2xx chat reply may still carry `{error}` instead of `{response}`.
pub fn chat_reply_text(status: u16, reply: AiChatReply) -> Result<String, ApiError> {
    match reply {
        AiChatReply {
            response: Some(text),
            ..
        } => Ok(text),
        AiChatReply { error, .. } => Err(ApiError::Status {
            status,
            message: error,
        }),
    }
}

async fn describe_http_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_from_body(status, &body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.ok() {
        return Err(describe_http_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// `TrafficBackend` over `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackend {
    base: String,
}

impl HttpBackend {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            base: config.api_base.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl TrafficBackend for HttpBackend {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        let response = Request::get(&self.url("/api/status"))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        read_json(response).await
    }

    async fn trigger_emergency(&self, lane: &LaneId) -> Result<(), ApiError> {
        let request = EmergencyRequest { lane: lane.clone() };

        let response = Request::post(&self.url("/api/emergency"))
            .json(&request)
            .map_err(|e| ApiError::Encode(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.ok() {
            return Err(describe_http_error(response).await);
        }

        Ok(())
    }

    async fn send_chat(&self, message: &str) -> Result<String, ApiError> {
        let request = AiChatRequest {
            message: message.to_string(),
        };

        let response = Request::post(&self.url("/api/ai-chat"))
            .json(&request)
            .map_err(|e| ApiError::Encode(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let reply: AiChatReply = read_json(response).await?;
        chat_reply_text(status, reply)
    }
}
