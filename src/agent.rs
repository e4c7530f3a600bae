use crate::cli::Args;
use crate::config::persona::PersonaSettings;
use crate::history::HistoryError;
use crate::llm::{ BackendKind, GenerationConfig, LlmConfig };
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::models::chat::ChatMessage;
use crate::session::ChatSession;

use log::{ info, warn, error };
use std::collections::HashMap;
use std::sync::Arc;

pub const ERROR_PREFIX: &str = "Error: ";

/// Routes a conversation to the selected backend and always produces a reply string.
#[derive(Clone)]
pub struct ChatAgent {
    clients: HashMap<BackendKind, Arc<dyn ChatClient>>,
}

impl ChatAgent {
    pub fn new(gemini: Arc<dyn ChatClient>, azure: Arc<dyn ChatClient>) -> Self {
        let mut clients = HashMap::new();
        clients.insert(BackendKind::Gemini, gemini);
        clients.insert(BackendKind::AzureOpenAI, azure);
        Self { clients }
    }

    pub fn from_args(args: &Args) -> Self {
        let gemini_config = LlmConfig {
            api_key: Some(args.gemini_api_key.clone()).filter(|k| !k.is_empty()),
            model: args.gemini_model.clone(),
            base_url: args.gemini_base_url.clone(),
            api_version: None,
        };
        let azure_config = LlmConfig {
            api_key: Some(args.azure_openai_api_key.clone()).filter(|k| !k.is_empty()),
            model: args.azure_openai_deployment.clone(),
            base_url: args.azure_openai_endpoint.clone(),
            api_version: args.azure_openai_api_version.clone(),
        };

        let agent = Self::new(
            new_chat_client(BackendKind::Gemini, &gemini_config),
            new_chat_client(BackendKind::AzureOpenAI, &azure_config)
        );
        for client in agent.clients.values() {
            if client.is_configured() {
                info!(
                    "Chat client configured: Type={}, Model={}, BaseURL={}",
                    client.kind(),
                    client.get_model(),
                    client.get_base_url().as_deref().unwrap_or("unset")
                );
            } else {
                warn!("Chat client {} has no credentials; its replies will be errors", client.kind());
            }
        }
        agent
    }

    pub fn client(&self, backend: BackendKind) -> Option<&Arc<dyn ChatClient>> {
        self.clients.get(&backend)
    }

    /// One backend call. Failures come back as `"Error: <message>"` instead of an `Err`.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        backend: BackendKind
    ) -> String {
        let client = match self.clients.get(&backend) {
            Some(c) => c,
            None => {
                return format!("{}no client registered for {}", ERROR_PREFIX, backend);
            }
        };
        match client.complete(messages, config).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Completion via {} failed: {}", backend, e);
                format!("{}{}", ERROR_PREFIX, e)
            }
        }
    }

    /// Records the user turn, asks the session's backend and records the reply.
    /// The returned string is what was appended, error text included. Input the
    /// history refuses is returned as `Err` and never reaches a backend.
    pub async fn process_message(
        &self,
        session: &mut ChatSession,
        message: &str
    ) -> Result<String, HistoryError> {
        session.record_user(message)?;
        let reply = self.complete(
            session.conversation().messages(),
            session.generation(),
            session.backend()
        ).await;
        if let Err(e) = session.record_reply(&reply) {
            warn!("Session {}: reply not recorded: {}", session.id(), e);
        }
        Ok(reply)
    }

    /// One-off completion over the persona and an example query. No session is touched.
    pub async fn test_prompt(
        &self,
        persona: &PersonaSettings,
        example_query: &str,
        config: &GenerationConfig,
        backend: BackendKind
    ) -> String {
        if example_query.trim().is_empty() {
            return format!("{}example query must not be empty", ERROR_PREFIX);
        }
        let messages = vec![
            ChatMessage::system(persona.system_prompt()),
            ChatMessage::user(example_query)
        ];
        self.complete(&messages, config, backend).await
    }
}
