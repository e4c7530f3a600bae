use log::info;
use uuid::Uuid;

use crate::config::persona::PersonaSettings;
use crate::history::{ Conversation, HistoryError };
use crate::llm::{ BackendKind, GenerationConfig, SettingsError };
use crate::models::chat::{ ChatMessage, Role };

/// Initial settings for every new session, taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct SessionDefaults {
    pub backend: Option<BackendKind>,
    pub generation: GenerationConfig,
    pub persona: PersonaSettings,
}

/// Everything one chat user owns: the history, the current settings and the
/// system prompt that was last written into the history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    conversation: Conversation,
    backend: BackendKind,
    generation: GenerationConfig,
    persona: PersonaSettings,
    last_applied_prompt: Option<String>,
}

impl ChatSession {
    pub fn new(defaults: SessionDefaults) -> Self {
        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            conversation: Conversation::new(),
            backend: defaults.backend.unwrap_or(BackendKind::Gemini),
            generation: defaults.generation,
            persona: PersonaSettings::default(),
            last_applied_prompt: None,
        };
        session.apply_persona(defaults.persona);
        session
    }

    /// Stores the persona and, if the resulting system prompt differs from the
    /// last one applied, restarts the conversation with it. Returns whether a reset happened.
    pub fn apply_persona(&mut self, persona: PersonaSettings) -> bool {
        let prompt = persona.system_prompt();
        self.persona = persona;
        if self.last_applied_prompt.as_deref() == Some(prompt.as_str()) {
            return false;
        }
        info!("Session {}: system prompt changed, resetting conversation", self.id);
        self.conversation.reset(Some(&prompt));
        self.last_applied_prompt = Some(prompt);
        true
    }

    pub fn update_generation(&mut self, config: GenerationConfig) -> Result<(), SettingsError> {
        config.validate()?;
        self.generation = config;
        Ok(())
    }

    pub fn select_backend(&mut self, backend: BackendKind) {
        self.backend = backend;
    }

    /// Starts over with the current system prompt.
    pub fn clear(&mut self) {
        let prompt = self.persona.system_prompt();
        self.conversation.reset(Some(&prompt));
        self.last_applied_prompt = Some(prompt);
    }

    pub fn record_user(&mut self, content: &str) -> Result<(), HistoryError> {
        self.conversation.append(ChatMessage::new(Role::User, content))
    }

    pub fn record_reply(&mut self, content: &str) -> Result<(), HistoryError> {
        self.conversation.append(ChatMessage::new(Role::Assistant, content))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn persona(&self) -> &PersonaSettings {
        &self.persona
    }

    pub fn system_prompt(&self) -> String {
        self.last_applied_prompt.clone().unwrap_or_else(|| self.persona.system_prompt())
    }
}
