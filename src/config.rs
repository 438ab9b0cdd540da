use thiserror::Error;

/// Crate-level constants
pub const APP_NAME: &str = "MedScribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "medscribe=info".to_string()
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the chat-completion service.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Per-request timeout. A call exceeding it fails its stage rather than
    /// hanging the run.
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Config with the standard service defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load config from the environment.
    ///
    /// `OPENAI_API_KEY` is required; `MEDSCRIBE_BASE_URL`, `MEDSCRIBE_MODEL`
    /// and `MEDSCRIBE_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("MEDSCRIBE_BASE_URL") {
            config = config.with_base_url(&base_url);
        }
        if let Ok(model) = std::env::var("MEDSCRIBE_MODEL") {
            config = config.with_model(&model);
        }
        if let Ok(raw) = std::env::var("MEDSCRIBE_TIMEOUT_SECS") {
            config.timeout_secs = parse_timeout_secs(&raw)?;
        }

        Ok(config)
    }
}

fn parse_timeout_secs(raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            var: "MEDSCRIBE_TIMEOUT_SECS",
            value: raw.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key configured: set OPENAI_API_KEY")]
    MissingApiKey,

    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}
