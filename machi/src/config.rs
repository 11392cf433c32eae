//! Ambient configuration: how to reach the Responses endpoint.
//!
//! Not part of the original component list — the Model adapter needs
//! somewhere concrete to read an API key, base URL, and timeout from, so
//! this follows the teacher's builder-pattern config idiom rather than
//! threading three loose parameters through every call.

use std::time::Duration;

use crate::error::{AgentError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the Responses endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: String,
    base_url: String,
    request_timeout: Duration,
    tracing_disabled: bool,
}

impl ApiConfig {
    /// Construct a config directly from an API key, using defaults for
    /// everything else.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tracing_disabled: false,
        }
    }

    /// Load from `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` (optional,
    /// defaults to the public endpoint), and `OPENAI_AGENTS_DISABLE_TRACING`
    /// (`"true"`/`"1"` disables tracing).
    ///
    /// # Errors
    /// Returns [`AgentError::InvalidConfig`] if `OPENAI_API_KEY` is unset.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::invalid_config("api_key", "OPENAI_API_KEY is not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(flag) = std::env::var("OPENAI_AGENTS_DISABLE_TRACING") {
            config.tracing_disabled = matches!(flag.as_str(), "true" | "1");
        }
        Ok(config)
    }

    /// Override the base URL (no trailing slash expected).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Disable the tracing subsystem regardless of environment.
    #[must_use]
    pub const fn with_tracing_disabled(mut self, disabled: bool) -> Self {
        self.tracing_disabled = disabled;
        self
    }

    /// The configured API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The configured per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// `true` if tracing should be skipped entirely.
    #[must_use]
    pub const fn tracing_disabled(&self) -> bool {
        self.tracing_disabled
    }
}
