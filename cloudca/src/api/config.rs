//! Client configuration

use std::time::Duration;

use super::error::ApiError;
use super::pool::ConnectionPoolConfig;

pub const DEFAULT_API_URL: &str = "https://api.cloud.ca/v1";

pub const ENV_API_URL: &str = "CLOUDCA_API_URL";
pub const ENV_API_KEY: &str = "CLOUDCA_API_KEY";
pub const ENV_INSECURE: &str = "CLOUDCA_INSECURE";
pub const ENV_POLL_INTERVAL_MS: &str = "CLOUDCA_POLL_INTERVAL_MS";
pub const ENV_TASK_TIMEOUT_SECS: &str = "CLOUDCA_TASK_TIMEOUT_SECS";

/// How asynchronous tasks are awaited.
///
/// Polls run at a fixed `interval`. With neither `max_attempts` nor `timeout`
/// set a task is awaited until it terminates or the caller's Context ends.
/// The first poll is always issued, whatever the bounds.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Polls issued before giving up, at least one
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: None,
            timeout: None,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Zero is raised to one
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub insecure: bool,
    pub pool: ConnectionPoolConfig,
    pub poll: PollConfig,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            insecure: false,
            pool: ConnectionPoolConfig::default(),
            poll: PollConfig::default(),
        }
    }

    /// Read configuration from `CLOUDCA_*` environment variables
    pub fn from_env() -> Result<Self, ApiError> {
        let api_url = std::env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ApiError::InvalidConfig(format!("{} environment variable is required", ENV_API_KEY))
            })?;

        let mut config = Self::new(api_url, api_key);

        if let Some(insecure) = env_parse::<bool>(ENV_INSECURE)? {
            config.insecure = insecure;
        }
        if let Some(ms) = env_parse::<u64>(ENV_POLL_INTERVAL_MS)? {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>(ENV_TASK_TIMEOUT_SECS)? {
            config.poll.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_pool(mut self, pool: ConnectionPoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Validated base URL without trailing slashes
    pub fn base_url(&self) -> Result<String, ApiError> {
        let parsed = url::Url::parse(&self.api_url).map_err(|e| {
            ApiError::InvalidConfig(format!("invalid API URL {}: {}", self.api_url, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidConfig(format!(
                "unsupported API URL scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(self.api_url.trim_end_matches('/').to_string())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ApiError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| {
                ApiError::InvalidConfig(format!("{} has an invalid value: {}", name, raw))
            }),
        Err(_) => Ok(None),
    }
}
