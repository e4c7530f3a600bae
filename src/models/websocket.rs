use serde::{ Serialize, Deserialize };

use crate::llm::{ BackendKind, GenerationConfig };
use crate::models::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "settings")] Settings {
        #[serde(default)]
        backend: Option<BackendKind>,
        #[serde(default)]
        generation: Option<GenerationConfig>,
        #[serde(default)]
        persona: Option<String>,
        #[serde(default)]
        tone: Option<String>,
    },
    #[serde(rename = "reset")]
    Reset,
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session")] Session {
        id: String,
        system_prompt: String,
    },
    #[serde(rename = "response")] Response {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "settings_applied")] SettingsApplied {
        system_prompt: String,
        reset: bool,
    },
    #[serde(rename = "history")] History {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
}
