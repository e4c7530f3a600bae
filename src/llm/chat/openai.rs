use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ non_empty, send_checked, BackendCallFailure, ChatClient };
use crate::llm::{ BackendKind, GenerationConfig, LlmConfig };
use crate::models::chat::ChatMessage;

pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-35-turbo";

/// Chat-completions body. Azure takes no `top_k`.
#[derive(Serialize, Debug, PartialEq)]
pub struct OpenAIChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

pub fn build_chat_request<'a>(
    messages: &'a [ChatMessage],
    config: &GenerationConfig
) -> OpenAIChatRequest<'a> {
    OpenAIChatRequest {
        messages,
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_output_tokens,
    }
}

fn extract_content(resp: OpenAIResponse) -> Result<String, BackendCallFailure> {
    let backend = BackendKind::AzureOpenAI;
    let choice = resp.choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendCallFailure::malformed(backend, "no choices in response"))?;
    let content = choice.message.content.ok_or_else(||
        BackendCallFailure::malformed(backend, "first choice has no message content")
    )?;
    non_empty(backend, content)
}

pub struct AzureOpenAIChatClient {
    http: HttpClient,
    api_key: Option<String>,
    endpoint: Option<String>,
    deployment: String,
    api_version: String,
}

impl AzureOpenAIChatClient {
    pub fn new(
        api_key: Option<String>,
        endpoint: Option<String>,
        deployment: Option<String>,
        api_version: Option<String>
    ) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            deployment: deployment.unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
            config.api_version.clone()
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

#[async_trait]
impl ChatClient for AzureOpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig
    ) -> Result<String, BackendCallFailure> {
        let backend = BackendKind::AzureOpenAI;
        let api_key = self.api_key.as_ref().ok_or(BackendCallFailure::MissingCredentials {
            backend,
            what: "AZURE_OPENAI_API_KEY",
        })?;
        let endpoint = self.endpoint.as_ref().ok_or(BackendCallFailure::MissingCredentials {
            backend,
            what: "AZURE_OPENAI_ENDPOINT",
        })?;
        info!(
            "AzureOpenAIChatClient::complete() → deployment={} messages={} endpoint={}",
            self.deployment,
            messages.len(),
            endpoint
        );

        let req = build_chat_request(messages, config);
        let request = self.http.post(self.url(endpoint)).header("api-key", api_key).json(&req);

        let resp = send_checked(backend, request)
            .await?
            .json::<OpenAIResponse>().await
            .map_err(|e| BackendCallFailure::malformed(backend, e.to_string()))?;
        extract_content(resp)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::AzureOpenAI
    }

    fn get_model(&self) -> String {
        self.deployment.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        self.endpoint.clone()
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sends_conversation_verbatim_without_top_k() {
        let messages = vec![ChatMessage::system("S"), ChatMessage::user("Hi")];
        let req = build_chat_request(&messages, &GenerationConfig::default());
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(
            value["messages"],
            json!([
                { "role": "system", "content": "S" },
                { "role": "user", "content": "Hi" }
            ])
        );
        assert_eq!(value["max_tokens"], json!(512));
        assert!(value.get("top_k").is_none());
    }

    #[test]
    fn returns_first_choice_content() {
        let resp: OpenAIResponse = serde_json
            ::from_value(
                json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "first" } },
                    { "message": { "role": "assistant", "content": "second" } }
                ]
            })
            )
            .unwrap();
        assert_eq!(extract_content(resp).unwrap(), "first");
    }

    #[test]
    fn empty_choices_are_malformed() {
        let resp: OpenAIResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(extract_content(resp), Err(BackendCallFailure::MalformedResponse { .. })));
    }

    #[test]
    fn builds_deployment_url() {
        let client = AzureOpenAIChatClient::new(
            Some("k".into()),
            Some("https://example.openai.azure.com/".into()),
            Some("chat".into()),
            None
        );
        assert_eq!(
            client.url("https://example.openai.azure.com/"),
            "https://example.openai.azure.com/openai/deployments/chat/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn needs_key_and_endpoint() {
        let client = AzureOpenAIChatClient::new(Some("k".into()), None, None, None);
        assert!(!client.is_configured());
    }
}
