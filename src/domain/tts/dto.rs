use serde::{Deserialize, Serialize};

fn default_rate() -> f32 {
    1.0
}

fn default_repeat_count() -> u32 {
    1
}

fn default_repeat_interval() -> f32 {
    3.0
}

/// Request for POST /api/tts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default = "default_rate")]
    pub rate: f32,
}

/// Request for POST /api/tts/batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTtsRequest {
    pub words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Seconds of silence between repeats of one word
    #[serde(default = "default_repeat_interval")]
    pub repeat_interval: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
}

/// Request for POST /api/tts/check-cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckCacheRequest {
    pub words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default = "default_rate")]
    pub rate: f32,
}

/// Query for GET /api/tts/voices
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoicesQuery {
    pub engine: Option<String>,
}

/// One entry of an engine's voice catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub locale: String,
    pub gender: String,
}
