use crate::error::ConfigError;
use std::time::Duration;
use url::Url;

pub const ENV_ENDPOINT: &str = "RELAY_ENDPOINT";
pub const ENV_TIMEOUT_MS: &str = "RELAY_TIMEOUT_MS";
pub const ENV_BASE_URL: &str = "RELAY_BASE_URL";

/// Default time a request may stay silent before it is failed with 504.
/// Relays usually signal liveness every few seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every request created from one [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay endpoint the descriptor parameters are appended to.
    pub endpoint: Url,
    /// Silence allowed before a request is forced to 504. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Location relative targets are resolved against.
    pub base_url: Option<Url>,
}

impl RelayConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: Some(DEFAULT_TIMEOUT),
            base_url: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Build a config from `RELAY_ENDPOINT`, `RELAY_TIMEOUT_MS` and `RELAY_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup(ENV_ENDPOINT)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEndpoint(ENV_ENDPOINT))?;
        let endpoint = parse_url(ENV_ENDPOINT, &endpoint)?;

        let mut config = Self::new(endpoint);

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout = timeout_from_millis(&raw)?;
        }

        if let Some(raw) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = Some(parse_url(ENV_BASE_URL, &raw)?);
        }

        Ok(config)
    }
}

/// Non-positive values disable the timeout.
fn timeout_from_millis(raw: &str) -> Result<Option<Duration>, ConfigError> {
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimeout(raw.to_string()))?;

    if millis <= 0 {
        Ok(None)
    } else {
        Ok(Some(Duration::from_millis(millis as u64)))
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })
}
