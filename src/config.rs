//! Environment-sourced service configuration.
//!
//! Read once at startup. A `.env` file in the working directory is loaded
//! into the process environment first when present; its outcome is logged
//! once the subscriber exists.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::models::Credential;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Process-wide fallback credential; `None` when unset or empty.
    pub default_credential: Option<Credential>,
    pub base_url: Url,
    pub model: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub log_format: LogFormat,
}

/// Result of the `.env` load, kept until logging is up.
#[derive(Debug)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    Missing,
    Failed(String),
}

impl DotenvStatus {
    pub fn from_result(result: Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => DotenvStatus::Loaded(path),
            Err(e) if e.not_found() => DotenvStatus::Missing,
            Err(e) => DotenvStatus::Failed(e.to_string()),
        }
    }

    pub fn log(&self) {
        match self {
            DotenvStatus::Loaded(path) => {
                tracing::debug!("loaded environment from {}", path.display())
            }
            DotenvStatus::Missing => tracing::debug!("no .env file found"),
            DotenvStatus::Failed(reason) => tracing::warn!("ignoring .env file: {}", reason),
        }
    }
}

/// Load `.env` into the process environment; call before [`Config::from_env`].
pub fn load_dotenv() -> DotenvStatus {
    DotenvStatus::from_result(dotenvy::dotenv())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests never touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let default_credential = get("GEMINI_API_KEY").map(Credential::new);

        let base_raw = get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&base_raw)?;

        let model = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let bind_addr = parse_or("ALIAS_BIND_ADDR", get("ALIAS_BIND_ADDR"), DEFAULT_BIND_ADDR)?;

        let timeout_ms: u64 = parse_or(
            "ALIAS_REQUEST_TIMEOUT_MS",
            get("ALIAS_REQUEST_TIMEOUT_MS"),
            "60000",
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "ALIAS_REQUEST_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        let retry_attempts = parse_or("ALIAS_RETRY_ATTEMPTS", get("ALIAS_RETRY_ATTEMPTS"), "2")?;
        let retry_delay_ms = parse_or("ALIAS_RETRY_DELAY_MS", get("ALIAS_RETRY_DELAY_MS"), "500")?;

        let log_format = match get("ALIAS_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "ALIAS_LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected \"pretty\" or \"json\"".to_string(),
                })
            }
        };

        Ok(Self {
            default_credential,
            base_url,
            model,
            bind_addr,
            request_timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
            retry_delay_ms,
            log_format,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "GEMINI_BASE_URL",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are allowed"));
    }
    Ok(url)
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}
