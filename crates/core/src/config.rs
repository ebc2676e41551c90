//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Binaries read the environment; the helpers here only ever receive the raw `Option<String>`
//! values, so request handling and tests never depend on process-wide environment state.

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_RATE_LIMIT_ATTEMPTS,
    DEFAULT_RECORDS_FILE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE,
};
use crate::notes::RetryPolicy;
use crate::{EhrError, EhrResult, NonEmptyText};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    records_path: PathBuf,
    llm: LlmConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(records_path: PathBuf, llm: LlmConfig) -> EhrResult<Self> {
        if records_path.as_os_str().is_empty() {
            return Err(EhrError::InvalidInput(
                "records path cannot be empty".into(),
            ));
        }

        Ok(Self { records_path, llm })
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn llm(&self) -> &LlmConfig {
        &self.llm
    }
}

/// Settings for the external text generator.
///
/// A missing API key is a supported configuration: the note service then runs in degraded
/// mode and answers every request with the fallback note.
#[derive(Clone)]
pub struct LlmConfig {
    api_key: Option<NonEmptyText>,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl LlmConfig {
    /// Create a configuration with the default model, endpoint and limits.
    pub fn new(api_key: Option<NonEmptyText>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default().with_attempts(DEFAULT_RATE_LIMIT_ATTEMPTS),
        }
    }

    /// Build from raw environment values; `None` or blank values take the defaults.
    ///
    /// # Errors
    ///
    /// Returns `EhrError::InvalidInput` if:
    /// - the base URL is not an `http(s)` URL,
    /// - the timeout or attempt count is not a positive integer.
    pub fn from_env_values(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: Option<String>,
        max_attempts: Option<String>,
    ) -> EhrResult<Self> {
        let mut cfg = Self::new(NonEmptyText::optional(api_key));

        if let Some(model) = NonEmptyText::optional(model) {
            cfg = cfg.with_model(model);
        }
        if let Some(base_url) = NonEmptyText::optional(base_url) {
            cfg = cfg.with_base_url(base_url.as_str())?;
        }

        let timeout_secs: u64 = parse_env_value(
            "EHR_LLM_TIMEOUT_SECS",
            timeout_secs,
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        let max_attempts: u32 =
            parse_env_value("EHR_LLM_MAX_ATTEMPTS", max_attempts, DEFAULT_RATE_LIMIT_ATTEMPTS)?;
        if timeout_secs == 0 || max_attempts == 0 {
            return Err(EhrError::InvalidInput(
                "EHR_LLM_TIMEOUT_SECS and EHR_LLM_MAX_ATTEMPTS must be greater than zero".into(),
            ));
        }

        let retry = cfg.retry.clone().with_attempts(max_attempts);
        Ok(cfg
            .with_request_timeout(Duration::from_secs(timeout_secs))
            .with_retry(retry))
    }

    pub fn with_model(mut self, model: NonEmptyText) -> Self {
        self.model = model.into_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> EhrResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(EhrError::InvalidInput(format!(
                "LLM base URL must start with http:// or https://: {trimmed}"
            )));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_key(&self) -> Option<&NonEmptyText> {
        self.api_key.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

// Hand-written so the API key never reaches logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Resolve the records file path from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_RECORDS_FILE`].
pub fn records_path_from_env_value(value: Option<String>) -> PathBuf {
    NonEmptyText::optional(value)
        .map(|v| PathBuf::from(v.as_str()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDS_FILE))
}

/// Parse an optional environment value, falling back to `default` when absent or blank.
pub fn parse_env_value<T: FromStr>(name: &str, value: Option<String>, default: T) -> EhrResult<T> {
    match NonEmptyText::optional(value) {
        None => Ok(default),
        Some(v) => v.as_str().parse::<T>().map_err(|_| {
            EhrError::InvalidInput(format!("{name} has an invalid value: {}", v.as_str()))
        }),
    }
}
