use parley_core::{INPUT_SAMPLE_RATE, LiveConnectConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// The live model used when `LIVE_MODEL` is not set.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub api_key: String,
    pub live_model: String,
    pub live_endpoint: Option<String>,
    /// `None` disables the bound on the upstream handshake.
    pub connect_timeout: Option<Duration>,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GOOGLE_API_KEY".to_string()))?;

        let live_model =
            std::env::var("LIVE_MODEL").unwrap_or_else(|_| DEFAULT_LIVE_MODEL.to_string());
        let live_endpoint = std::env::var("GEMINI_LIVE_ENDPOINT").ok();

        let timeout_str = std::env::var("CONNECT_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "CONNECT_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a whole number of seconds", timeout_str),
            )
        })?;
        let connect_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            bind_address,
            api_key,
            live_model,
            live_endpoint,
            connect_timeout,
            log_level,
            prompts_path,
        })
    }

    /// Builds the per-session settings shared by every relay session.
    pub fn relay_settings(&self, live: LiveConnectConfig) -> RelaySettings {
        RelaySettings {
            model: self.live_model.clone(),
            input_sample_rate: INPUT_SAMPLE_RATE,
            connect_timeout: self.connect_timeout,
            live,
        }
    }
}

/// Immutable settings every session is created with.
#[derive(Clone, Debug)]
pub struct RelaySettings {
    pub model: String,
    /// Sample rate the client's PCM audio is tagged with upstream.
    pub input_sample_rate: u32,
    pub connect_timeout: Option<Duration>,
    pub live: LiveConnectConfig,
}
