use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Session timeout applied when the config does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 55_000;
/// Lower bound for the session timeout.
pub const MIN_TIMEOUT_MS: u64 = 5_000;
/// Upper bound for the session timeout.
pub const MAX_TIMEOUT_MS: u64 = 300_000;

/// Config file shape. Keys are camelCase; unknown keys are rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    api_key: String,
    timeout_ms: Option<f64>,
    #[serde(default)]
    dataset_overrides: HashMap<String, String>,
    customer_id: Option<String>,
    proxy_zone: Option<String>,
    proxy_password: Option<String>,
}

/// Validated Hermes configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the scrape API, with `${VAR}` references resolved.
    pub api_key: String,
    /// Wall-clock bound for one submit + poll session.
    pub timeout: Duration,
    /// Dataset key to dataset id overrides, consulted before the built-in
    /// registry.
    pub dataset_overrides: HashMap<String, String>,
    /// Bright Data customer id, needed only for proxy sessions.
    pub customer_id: Option<String>,
    /// Scraping Browser zone name, needed only for proxy sessions.
    pub proxy_zone: Option<String>,
    /// Zone password, needed only for proxy sessions.
    pub proxy_password: Option<String>,
}

impl Config {
    /// Programmatic constructor with defaults. File-based input should go
    /// through [`Config::parse`] instead, which validates ranges.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            dataset_overrides: HashMap::new(),
            customer_id: None,
            proxy_zone: None,
            proxy_password: None,
        }
    }

    /// Sets the session timeout. Callers are expected to stay within the
    /// [`MIN_TIMEOUT_MS`]..=[`MAX_TIMEOUT_MS`] range that `parse` enforces.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maps a dataset key to a custom dataset id.
    pub fn with_dataset_override(
        mut self,
        key: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Self {
        self.dataset_overrides.insert(key.into(), dataset_id.into());
        self
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_proxy_zone(mut self, proxy_zone: impl Into<String>) -> Self {
        self.proxy_zone = Some(proxy_zone.into());
        self
    }

    pub fn with_proxy_password(mut self, proxy_password: impl Into<String>) -> Self {
        self.proxy_password = Some(proxy_password.into());
        self
    }

    /// Parses and validates a JSON config value.
    ///
    /// `lookup` resolves `${VAR}` references in the API key; pass a closure
    /// over a fixed map in tests and [`std::env::var`] in production code.
    pub fn parse<F>(value: serde_json::Value, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !value.is_object() {
            return Err(AppError::ConfigError("config is required".to_string()));
        }
        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|e| AppError::ConfigError(format!("invalid config: {e}")))?;

        if raw.api_key.trim().is_empty() {
            return Err(AppError::ConfigError("apiKey is required".to_string()));
        }

        let timeout_ms = match raw.timeout_ms {
            Some(ms) => ms.floor(),
            None => DEFAULT_TIMEOUT_MS as f64,
        };
        if !(MIN_TIMEOUT_MS as f64..=MAX_TIMEOUT_MS as f64).contains(&timeout_ms) {
            return Err(AppError::ConfigError(format!(
                "timeoutMs must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
            )));
        }

        let api_key = resolve_placeholders(&raw.api_key, lookup)?;

        Ok(Self {
            api_key,
            timeout: Duration::from_millis(timeout_ms as u64),
            dataset_overrides: raw.dataset_overrides,
            customer_id: non_blank(raw.customer_id),
            proxy_zone: non_blank(raw.proxy_zone),
            proxy_password: non_blank(raw.proxy_password),
        })
    }

    /// Loads a JSON config file, resolving `${VAR}` references against the
    /// process environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            AppError::ConfigError(format!("invalid JSON in config file {}: {e}", path.display()))
        })?;
        Self::parse(value, |name| std::env::var(name).ok())
    }
}

/// Substitutes `${VAR}` references in `input` using `lookup`.
///
/// A variable that is unset, or set to the empty string, is an error.
/// Text without a closing brace is passed through literally, as is the
/// degenerate `${}`.
pub fn resolve_placeholders<F>(input: &str, lookup: F) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            Some(end) => {
                let name = &after[..end];
                let value = lookup(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                    AppError::ConfigError(format!("Environment variable {name} is not set"))
                })?;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
