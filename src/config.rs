use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::audio::{PcmFormat, PlayerConfig};
use crate::services::gemini::client::DEFAULT_BASE_URL;
use crate::services::GeminiModels;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not found: set GEMINI_API_KEY (or API_KEY)")]
    MissingApiKey,

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub models: GeminiModels,
    pub http_timeout: Duration,
    pub history_path: PathBuf,
    pub pcm: PcmFormat,
    pub player: PlayerConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = GeminiModels::default();
        let models = GeminiModels {
            vision: get("LUMINA_VISION_MODEL").unwrap_or(defaults.vision),
            details: get("LUMINA_DETAILS_MODEL").unwrap_or(defaults.details),
            speech: get("LUMINA_TTS_MODEL").unwrap_or(defaults.speech),
            voice: get("LUMINA_VOICE").unwrap_or(defaults.voice),
        };

        let mut pcm = PcmFormat::default();
        if let Some(raw) = get("LUMINA_SAMPLE_RATE") {
            pcm.sample_rate = parse_positive("LUMINA_SAMPLE_RATE", &raw)?;
        }
        if let Some(raw) = get("LUMINA_CHANNELS") {
            pcm.channels = parse_positive("LUMINA_CHANNELS", &raw)?;
        }

        let mut player = PlayerConfig::default();
        if let Some(raw) = get("LUMINA_POLL_MS") {
            player.poll_interval = Duration::from_millis(parse_positive("LUMINA_POLL_MS", &raw)?);
        }

        let http_timeout = match get("LUMINA_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("LUMINA_HTTP_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
            base_url: get("LUMINA_API_BASE").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            models,
            http_timeout,
            history_path: get("LUMINA_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_history_path),
            pcm,
            player,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("lumina"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_FILE)
}

fn parse_positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialOrd,
    T::Err: std::fmt::Display,
{
    let value: T = raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
