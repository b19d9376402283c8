use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;

use super::engine::Engine;

/// Slowest rate accepted by any backend
pub const MIN_RATE: f32 = 0.5;
/// Fastest rate accepted by any backend
pub const MAX_RATE: f32 = 2.0;

const FIELD_SEPARATOR: char = '\u{1f}';

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Speaking rate, clamped to [`MIN_RATE`, `MAX_RATE`] and quantized to a whole
/// percentage offset from the default speed.
///
/// Both the cache key and every backend request derive their rate parameter
/// from the same offset, so two inputs that share a key always sound the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeechRate {
    offset_percent: i32,
}

impl SpeechRate {
    pub fn new(rate: f32) -> Self {
        let rate = if rate.is_nan() {
            1.0
        } else {
            rate.clamp(MIN_RATE, MAX_RATE)
        };

        Self {
            offset_percent: ((rate - 1.0) * 100.0).round() as i32,
        }
    }

    pub fn normal() -> Self {
        Self { offset_percent: 0 }
    }

    /// Offset from the default speed, e.g. `20` for 1.2x
    pub fn offset_percent(&self) -> i32 {
        self.offset_percent
    }

    /// Speed multiplier, e.g. `1.2`
    pub fn multiplier(&self) -> f32 {
        1.0 + self.offset_percent as f32 / 100.0
    }

    /// Speed as a percentage of the default, e.g. `120` for 1.2x
    pub fn percent_of_default(&self) -> i32 {
        100 + self.offset_percent
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self::normal()
    }
}

/// Renders as a signed percentage offset (`+20%`, `-50%`, `+0%`)
impl fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.offset_percent)
    }
}

/// Trim the text and collapse inner whitespace runs to a single space
pub fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Content fingerprint of one synthesized segment.
///
/// SHA-256 over `engine`, `voice`, rate offset and normalized text, joined by a
/// unit separator. Pure function of its inputs, so keys survive restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(engine: Engine, voice: &str, rate: SpeechRate, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(engine.as_str().as_bytes());
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(voice.as_bytes());
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(rate.to_string().as_bytes());
        hasher.update([FIELD_SEPARATOR as u8]);
        hasher.update(normalize_text(text).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the on-disk cache entry
    pub fn file_name(&self) -> String {
        format!("{}.mp3", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
