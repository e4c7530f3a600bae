pub mod openai;
pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::{ BackendKind, GenerationConfig, LlmConfig };
use crate::models::chat::ChatMessage;
use self::gemini::GeminiChatClient;
use self::openai::AzureOpenAIChatClient;

/// Any failure while talking to a backend. The dispatcher renders it as
/// `"Error: <message>"`; no variant is retried.
#[derive(Debug, Error)]
pub enum BackendCallFailure {
    #[error("{backend} is not configured: {what} is missing")] MissingCredentials {
        backend: BackendKind,
        what: &'static str,
    },
    #[error("request to {backend} failed: {source}")] Transport {
        backend: BackendKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{backend} returned HTTP {status}: {body}")] Status {
        backend: BackendKind,
        status: u16,
        body: String,
    },
    #[error("malformed response from {backend}: {reason}")] MalformedResponse {
        backend: BackendKind,
        reason: String,
    },
    #[error("{backend} returned an empty reply")] EmptyReply {
        backend: BackendKind,
    },
}

impl BackendCallFailure {
    pub fn transport(backend: BackendKind, source: reqwest::Error) -> Self {
        BackendCallFailure::Transport { backend, source }
    }

    pub fn malformed(backend: BackendKind, reason: impl Into<String>) -> Self {
        BackendCallFailure::MalformedResponse { backend, reason: reason.into() }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the whole conversation and returns the reply text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig
    ) -> Result<String, BackendCallFailure>;

    fn kind(&self) -> BackendKind;
    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
    fn is_configured(&self) -> bool;
}

/// Sends the request and maps non-2xx responses into [`BackendCallFailure::Status`].
pub(crate) async fn send_checked(
    backend: BackendKind,
    request: reqwest::RequestBuilder
) -> Result<reqwest::Response, BackendCallFailure> {
    let resp = request
        .send().await
        .map_err(|e| BackendCallFailure::transport(backend, e))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendCallFailure::Status {
        backend,
        status: status.as_u16(),
        body: extract_error_message(&body),
    })
}

/// Both backends wrap failures as `{"error": {"message": ...}}`; fall back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json
        ::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn non_empty(
    backend: BackendKind,
    text: String
) -> Result<String, BackendCallFailure> {
    if text.trim().is_empty() {
        Err(BackendCallFailure::EmptyReply { backend })
    } else {
        Ok(text)
    }
}

pub fn new_client(kind: BackendKind, config: &LlmConfig) -> Arc<dyn ChatClient> {
    match kind {
        BackendKind::Gemini => Arc::new(GeminiChatClient::from_config(config)),
        BackendKind::AzureOpenAI => Arc::new(AzureOpenAIChatClient::from_config(config)),
    }
}
