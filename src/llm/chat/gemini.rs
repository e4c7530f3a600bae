use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ non_empty, send_checked, BackendCallFailure, ChatClient };
use crate::history::format_history_for_prompt;
use crate::llm::{ BackendKind, GenerationConfig, LlmConfig };
use crate::models::chat::ChatMessage;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Serialize, Debug, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GooglePromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

/// Flattens the conversation into one user prompt carrying the sampling parameters.
pub fn build_generate_request(
    messages: &[ChatMessage],
    config: &GenerationConfig
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: format_history_for_prompt(messages),
            }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        },
    }
}

fn extract_text(resp: GoogleResponse) -> Result<String, BackendCallFailure> {
    let backend = BackendKind::Gemini;
    let candidate = match resp.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = resp.prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked ({})", r))
                .unwrap_or_else(|| "no candidates in response".to_string());
            return Err(BackendCallFailure::malformed(backend, reason));
        }
    };
    let content = candidate.content.ok_or_else(|| {
        BackendCallFailure::malformed(
            backend,
            format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )
        )
    })?;
    let text = content.parts
        .into_iter()
        .map(|p| p.text)
        .collect::<String>();
    non_empty(backend, text)
}

pub struct GeminiChatClient {
    http: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone(), config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig
    ) -> Result<String, BackendCallFailure> {
        let api_key = self.api_key.as_ref().ok_or(BackendCallFailure::MissingCredentials {
            backend: BackendKind::Gemini,
            what: "GEMINI_API_KEY",
        })?;
        info!(
            "GeminiChatClient::complete() → model={} messages={} base_url={}",
            self.model,
            messages.len(),
            self.base_url
        );

        let payload = build_generate_request(messages, config);
        let request = self.http.post(self.endpoint()).header("x-goog-api-key", api_key).json(&payload);

        let resp = send_checked(BackendKind::Gemini, request)
            .await?
            .json::<GoogleResponse>().await
            .map_err(|e| BackendCallFailure::malformed(BackendKind::Gemini, e.to_string()))?;
        extract_text(resp)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_flattened_prompt_and_top_k() {
        let config = GenerationConfig::default();
        let req = build_generate_request(&[ChatMessage::user("Hi")], &config);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "User: Hi" }] }],
                "generationConfig": {
                    "temperature": 0.7f32,
                    "topP": 0.95f32,
                    "topK": 40,
                    "maxOutputTokens": 512
                }
            })
        );
    }

    #[test]
    fn joins_all_parts_of_first_candidate() {
        let resp: GoogleResponse = serde_json
            ::from_value(
                json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "Hello" }, { "text": " there" }] } },
                    { "content": { "parts": [{ "text": "ignored" }] } }
                ]
            })
            )
            .unwrap();
        assert_eq!(extract_text(resp).unwrap(), "Hello there");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let resp: GoogleResponse = serde_json
            ::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
            .unwrap();
        let err = extract_text(resp).unwrap_err();
        assert_eq!(err.to_string(), "malformed response from gemini: prompt blocked (SAFETY)");
    }

    #[test]
    fn endpoint_uses_model_path() {
        let client = GeminiChatClient::new(
            Some("k".into()),
            None,
            Some("http://localhost:9000/".into())
        );
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn blank_key_counts_as_unconfigured() {
        let client = GeminiChatClient::new(Some("  ".into()), None, None);
        assert!(!client.is_configured());
    }
}
