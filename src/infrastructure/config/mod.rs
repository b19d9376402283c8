use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::tts::{Engine, RetryPolicy};
use crate::infrastructure::admission::AdmissionConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Audio cache
    pub cache_dir: PathBuf,
    pub memory_cache_capacity: u64,
    // Admission control
    pub max_concurrency: usize,
    pub session_timeout_secs: u64,
    pub session_sweep_secs: u64,
    pub admission_wait_secs: u64,
    // Synthesis
    pub synthesis_concurrency: usize,
    pub synthesis_max_retries: u32,
    pub synthesis_retry_base_ms: u64,
    pub batch_chunk_size: usize,
    pub voices_cache_ttl_secs: u64,
    pub default_engine: Engine,
    // AWS Polly
    pub aws_region: String,
    pub polly_default_voice: String,
    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_tts_model: String,
    pub openai_default_voice: String,
    // Prompts and assembly
    pub intro_text: String,
    pub outro_text: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var_or(key, default)
        .trim()
        .parse()
        .map_err(|e| format!("invalid {}: {}", key, e).into())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let default_engine: Engine = parse_var("DEFAULT_ENGINE", "polly")?;
        if default_engine.is_client_resident() {
            return Err(format!("DEFAULT_ENGINE cannot be {}", default_engine).into());
        }

        let config = Config {
            database_url: env::var("DATABASE_URL")?,
            host: var_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", "8000")?,
            environment: match var_or("ENVIRONMENT", "development").as_str() {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match var_or("LOG_FORMAT", "pretty").as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            cache_dir: optional_var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("dictation_tts")),
            memory_cache_capacity: parse_var("MEMORY_CACHE_CAPACITY", "512")?,
            max_concurrency: parse_var("MAX_CONCURRENCY", "3")?,
            session_timeout_secs: parse_var("SESSION_TIMEOUT_SECS", "300")?,
            session_sweep_secs: parse_var("SESSION_SWEEP_SECS", "30")?,
            admission_wait_secs: parse_var("ADMISSION_WAIT_SECS", "30")?,
            synthesis_concurrency: parse_var("SYNTHESIS_CONCURRENCY", "3")?,
            synthesis_max_retries: parse_var("SYNTHESIS_MAX_RETRIES", "3")?,
            synthesis_retry_base_ms: parse_var("SYNTHESIS_RETRY_BASE_MS", "1000")?,
            batch_chunk_size: parse_var("BATCH_CHUNK_SIZE", "5")?,
            voices_cache_ttl_secs: parse_var("VOICES_CACHE_TTL_SECS", "3600")?,
            default_engine,
            aws_region: var_or("AWS_REGION", "eu-west-1"),
            polly_default_voice: var_or("POLLY_DEFAULT_VOICE", "Zhiyu"),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            openai_tts_model: var_or("OPENAI_TTS_MODEL", "tts-1"),
            openai_default_voice: var_or("OPENAI_DEFAULT_VOICE", "alloy"),
            intro_text: var_or("INTRO_TEXT", "听写开始"),
            outro_text: var_or("OUTRO_TEXT", "听写结束"),
            ffmpeg_path: optional_var("FFMPEG_PATH").map(PathBuf::from),
            static_dir: optional_var("STATIC_DIR").map(PathBuf::from),
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn admission(&self) -> AdmissionConfig {
        AdmissionConfig {
            max_sessions: self.max_concurrency,
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            sweep_interval: Duration::from_secs(self.session_sweep_secs.max(1)),
            wait_timeout: Duration::from_secs(self.admission_wait_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.synthesis_max_retries,
            base_delay: Duration::from_millis(self.synthesis_retry_base_ms),
        }
    }

    pub fn voices_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.voices_cache_ttl_secs)
    }
}
