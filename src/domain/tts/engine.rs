use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::TtsServiceError;

/// Speech engines the service knows how to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "polly")]
    Polly,
    #[serde(rename = "openai")]
    OpenAi,
    /// Browser speech synthesis; audio is produced on the client
    #[serde(rename = "web-speech")]
    WebSpeech,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Polly => "polly",
            Engine::OpenAi => "openai",
            Engine::WebSpeech => "web-speech",
        }
    }

    /// True when the engine has no server-side backend
    pub fn is_client_resident(&self) -> bool {
        matches!(self, Engine::WebSpeech)
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Engine {
    type Err = TtsServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "polly" => Ok(Engine::Polly),
            "openai" => Ok(Engine::OpenAi),
            "web-speech" => Ok(Engine::WebSpeech),
            other => Err(TtsServiceError::UnsupportedEngine(other.to_string())),
        }
    }
}
