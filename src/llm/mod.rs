pub mod chat;

use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BackendKind {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "azure", alias = "azure-openai", alias = "azure_openai")]
    AzureOpenAI,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Gemini, BackendKind::AzureOpenAI];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gemini => "gemini",
            BackendKind::AzureOpenAI => "azure",
        }
    }

    /// Human-readable name for the model selector.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Gemini => "Gemini",
            BackendKind::AzureOpenAI => "Azure OpenAI",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid backend: '{input}' (expected 'gemini' or 'azure')")]
pub struct ParseBackendKindError {
    input: String,
}

impl FromStr for BackendKind {
    type Err = ParseBackendKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(BackendKind::Gemini),
            "azure" | "azure-openai" | "azure_openai" => Ok(BackendKind::AzureOpenAI),
            _ =>
                Err(ParseBackendKindError {
                    input: s.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max}, got {value}")] OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{0}")] InvalidBackend(#[from] ParseBackendKindError),
    #[error("{0}")] InvalidTone(#[from] crate::config::persona::ParseToneError),
}

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_K_RANGE: (u32, u32) = (1, 100);
pub const MAX_OUTPUT_TOKENS_RANGE: (u32, u32) = (50, 2048);

/// Sampling parameters read from the UI sliders for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 512,
        }
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), SettingsError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange { field, value, min, max })
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range(
            "temperature",
            self.temperature as f64,
            (TEMPERATURE_RANGE.0 as f64, TEMPERATURE_RANGE.1 as f64)
        )?;
        check_range("top_p", self.top_p as f64, (TOP_P_RANGE.0 as f64, TOP_P_RANGE.1 as f64))?;
        check_range("top_k", self.top_k as f64, (TOP_K_RANGE.0 as f64, TOP_K_RANGE.1 as f64))?;
        check_range(
            "max_output_tokens",
            self.max_output_tokens as f64,
            (MAX_OUTPUT_TOKENS_RANGE.0 as f64, MAX_OUTPUT_TOKENS_RANGE.1 as f64)
        )?;
        Ok(())
    }
}

/// Connection details for one backend. Missing credentials are tolerated at
/// construction time and reported when the backend is called.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_aliases() {
        assert_eq!("Gemini".parse::<BackendKind>(), Ok(BackendKind::Gemini));
        assert_eq!("azure-openai".parse::<BackendKind>(), Ok(BackendKind::AzureOpenAI));
        assert_eq!(" AZURE ".parse::<BackendKind>(), Ok(BackendKind::AzureOpenAI));
        assert!("claude".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_serializes_short_name() {
        assert_eq!(serde_json::to_string(&BackendKind::AzureOpenAI).unwrap(), r#""azure""#);
        let kind: BackendKind = serde_json::from_str(r#""azure_openai""#).unwrap();
        assert_eq!(kind, BackendKind::AzureOpenAI);
    }

    #[test]
    fn default_generation_config_is_valid() {
        assert_eq!(GenerationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn accepts_range_boundaries() {
        let config = GenerationConfig {
            temperature: 0.0,
            top_p: 1.0,
            top_k: 100,
            max_output_tokens: 50,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let too_hot = GenerationConfig { temperature: 1.5, ..Default::default() };
        assert!(
            matches!(too_hot.validate(), Err(SettingsError::OutOfRange { field: "temperature", .. }))
        );

        let no_k = GenerationConfig { top_k: 0, ..Default::default() };
        assert!(matches!(no_k.validate(), Err(SettingsError::OutOfRange { field: "top_k", .. })));

        let huge = GenerationConfig { max_output_tokens: 4096, ..Default::default() };
        assert!(
            matches!(huge.validate(), Err(SettingsError::OutOfRange { field: "max_output_tokens", .. }))
        );

        let nan = GenerationConfig { top_p: f32::NAN, ..Default::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: GenerationConfig = serde_json::from_str(r#"{"temperature":0.2}"#).unwrap();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.top_k, 40);
        assert_eq!(config.max_output_tokens, 512);
    }
}
