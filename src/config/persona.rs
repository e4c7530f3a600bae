use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Default,
    Formal,
    Casual,
    Friendly,
    Professional,
    Humorous,
    Empathetic,
    Concise,
}

impl Tone {
    pub const ALL: [Tone; 8] = [
        Tone::Default,
        Tone::Formal,
        Tone::Casual,
        Tone::Friendly,
        Tone::Professional,
        Tone::Humorous,
        Tone::Empathetic,
        Tone::Concise,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tone::Default => "Default",
            Tone::Formal => "Formal",
            Tone::Casual => "Casual",
            Tone::Friendly => "Friendly",
            Tone::Professional => "Professional",
            Tone::Humorous => "Humorous",
            Tone::Empathetic => "Empathetic",
            Tone::Concise => "Concise",
        }
    }

    /// The sentence appended to the persona, `None` for [`Tone::Default`].
    pub fn instruction(&self) -> Option<String> {
        match self {
            Tone::Default => None,
            other =>
                Some(
                    format!("The assistant should respond in a {} tone.", other.name().to_lowercase())
                ),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid tone: '{input}'")]
pub struct ParseToneError {
    input: String,
}

impl FromStr for Tone {
    type Err = ParseToneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tone::ALL.iter()
            .copied()
            .find(|tone| tone.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseToneError { input: s.to_string() })
    }
}

/// User-editable persona text plus the selected tone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    pub persona: String,
    pub tone: Tone,
}

impl PersonaSettings {
    pub fn new(persona: impl Into<String>, tone: Tone) -> Self {
        Self { persona: persona.into(), tone }
    }

    pub fn system_prompt(&self) -> String {
        effective_system_prompt(&self.persona, self.tone)
    }
}

pub fn effective_system_prompt(persona: &str, tone: Tone) -> String {
    let persona = persona.trim();
    let mut prompt = if persona.is_empty() {
        DEFAULT_SYSTEM_PROMPT.to_string()
    } else {
        persona.to_string()
    };
    if let Some(instruction) = tone.instruction() {
        prompt.push(' ');
        prompt.push_str(&instruction);
    }
    prompt
}
