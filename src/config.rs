//! Configuration for a PDF question session.
//!
//! All knobs live in [`AgentConfig`], built via its [`AgentConfigBuilder`].
//! Defaults reproduce the fixed request shape: model `gpt-4o`, temperature
//! `0.7`, the public OpenAI endpoint and an API key read from the environment
//! at the moment of the first call.

use crate::error::AgentError;
use std::fmt;

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default OpenAI-compatible API root (without `/chat/completions`).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable consulted for the API key when none is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for extraction and completion.
///
/// # Example
/// ```rust
/// use pdf_agent::AgentConfig;
///
/// let config = AgentConfig::builder()
///     .model("gpt-4o-mini")
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Clone)]
pub struct AgentConfig {
    /// Chat model identifier. Default: `gpt-4o`.
    pub model: String,

    /// Sampling temperature, 0.0–2.0. Default: 0.7.
    pub temperature: f32,

    /// API root of an OpenAI-compatible provider. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// API key. When `None`, [`API_KEY_ENV`] is read at call time.
    pub api_key: Option<String>,

    /// Per-request timeout for the completion call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AgentConfig {
    /// Create a new builder for `AgentConfig`.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key: configured value first, then the environment.
    ///
    /// A missing key is only an error once a call is attempted.
    pub fn resolve_api_key(&self) -> Result<String, AgentError> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(AgentError::MissingApiKey),
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(AgentError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(AgentError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_request_shape() {
        let c = AgentConfig::default();
        assert_eq!(c.model, "gpt-4o");
        assert_eq!(c.temperature, 0.7);
        assert_eq!(c.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AgentConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
        let c = AgentConfig::builder().temperature(-1.0).build().unwrap();
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn zero_download_timeout_rejected() {
        let err = AgentConfig::builder()
            .download_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidConfig(_)));
        assert!(err.to_string().contains("download timeout"));
    }

    #[test]
    fn empty_model_rejected() {
        let err = AgentConfig::builder().model("  ").build().unwrap_err();
        assert!(matches!(err, AgentError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_base_url_rejected() {
        let err = AgentConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let c = AgentConfig::builder()
            .base_url("http://localhost:11434/v1/")
            .build()
            .unwrap();
        assert_eq!(c.completions_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let c = AgentConfig::builder().api_key("sk-test").build().unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn debug_redacts_key() {
        let c = AgentConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
