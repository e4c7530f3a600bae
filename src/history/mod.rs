use log::debug;
use thiserror::Error;

use crate::models::chat::{ ChatMessage, Role };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("system messages can only be set when the conversation is reset")]
    MisplacedSystem,
}

/// In-memory, append-only chat history for a single session.
///
/// A system message, when present, is always at index 0 and only enters
/// through [`Conversation::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(system_prompt: &str) -> Self {
        let mut conversation = Self::new();
        conversation.reset(Some(system_prompt));
        conversation
    }

    pub fn append(&mut self, message: ChatMessage) -> Result<(), HistoryError> {
        if message.content.trim().is_empty() {
            return Err(HistoryError::EmptyContent);
        }
        if message.role == Role::System {
            return Err(HistoryError::MisplacedSystem);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Drops every message. A non-empty `system_prompt` becomes the new first message.
    pub fn reset(&mut self, system_prompt: Option<&str>) {
        debug!("Resetting conversation ({} messages dropped)", self.messages.len());
        self.messages.clear();
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            self.messages.push(ChatMessage::system(prompt));
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Flattens a conversation into the single prompt sent to text-generation backends.
pub fn format_history_for_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role.label(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}
