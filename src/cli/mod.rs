use clap::Parser;

use crate::config::persona::{ PersonaSettings, Tone };
use crate::llm::{ BackendKind, GenerationConfig };
use crate::session::SessionDefaults;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Gemini (generative text) Args ---
    /// API key for the Gemini generateContent API.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Gemini model name (e.g., gemini-2.0-flash)
    #[arg(long, env = "GEMINI_MODEL")] // No default, rely on adapter defaults if None
    pub gemini_model: Option<String>,

    /// Base URL of the Gemini API (e.g., https://generativelanguage.googleapis.com)
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub gemini_base_url: Option<String>,

    // --- Azure OpenAI (chat completion) Args ---
    /// API key for the Azure OpenAI resource.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub azure_openai_api_key: String,

    /// Azure OpenAI resource endpoint (e.g., https://my-resource.openai.azure.com)
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub azure_openai_endpoint: Option<String>,

    /// Azure OpenAI REST API version (e.g., 2024-02-01)
    #[arg(long, env = "AZURE_OPENAI_API_VERSION")]
    pub azure_openai_api_version: Option<String>,

    /// Name of the chat model deployment (e.g., gpt-35-turbo)
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    pub azure_openai_deployment: Option<String>,

    // --- Session Defaults ---
    /// Backend selected for new sessions (gemini, azure)
    #[arg(long, env = "DEFAULT_BACKEND", default_value = "gemini")]
    pub default_backend: BackendKind,

    /// Persona text applied to new sessions. Empty means "You are a helpful assistant."
    #[arg(long, env = "DEFAULT_PERSONA", default_value = "")]
    pub default_persona: String,

    /// Tone applied to new sessions (Default, Formal, Casual, Friendly, Professional, Humorous, Empathetic, Concise)
    #[arg(long, env = "DEFAULT_TONE", default_value = "Default")]
    pub default_tone: Tone,

    #[arg(long, env = "DEFAULT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    #[arg(long, env = "DEFAULT_TOP_P", default_value = "0.95")]
    pub top_p: f32,

    #[arg(long, env = "DEFAULT_TOP_K", default_value = "40")]
    pub top_k: u32,

    #[arg(long, env = "DEFAULT_MAX_TOKENS", default_value = "512")]
    pub max_output_tokens: u32,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket chat server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP server that serves the chat page and the REST API.
    #[arg(long, env = "HTTP_PORT", default_value = "8080")]
    pub http_port: u16,
}

impl Args {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            backend: Some(self.default_backend),
            generation: self.generation_config(),
            persona: PersonaSettings::new(self.default_persona.clone(), self.default_tone),
        }
    }

    /// Port of `server_addr`, advertised to the browser page.
    pub fn ws_port(&self) -> Option<u16> {
        self.server_addr.rsplit(':').next().and_then(|p| p.parse().ok())
    }
}
