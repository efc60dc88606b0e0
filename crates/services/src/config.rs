use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "QUIZ_API_BASE_URL";
pub const TOKEN_VAR: &str = "QUIZ_API_TOKEN";
pub const TIMEOUT_VAR: &str = "QUIZ_API_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote quiz API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ApiConfig {
    /// Build a config for `base_url` with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the url cannot carry a path.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(BASE_URL_VAR, base_url)?,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t: &String| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base url is missing or any value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Read the config through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base url is missing or any value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = lookup(BASE_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing { var: BASE_URL_VAR })?;
        let mut config = Self::new(raw.trim())?;

        if let Some(token) = lookup(TOKEN_VAR) {
            config = config.with_token(token.trim());
        }

        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: TIMEOUT_VAR,
                    raw,
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidBaseUrl {
        var,
        raw: raw.to_owned(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}
