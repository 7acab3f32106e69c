//! Client configuration loading: JSON file, built-in defaults, then environment overrides.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::state::DEFAULT_SETTLED_HISTORY;

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/shelf-sync.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SHELF_SYNC_CONFIG_PATH";
const API_URL_ENV: &str = "SHELF_SYNC_API_URL";
const API_TOKEN_ENV: &str = "SHELF_SYNC_API_TOKEN";
const LOCALE_ENV: &str = "SHELF_SYNC_LOCALE";

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_AUTH_SCHEME: &str = "Token";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Failures raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Immutable runtime configuration shared by the gateway, the store and the dispatcher.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash.
    #[validate(url)]
    pub api_url: String,
    /// API token; requests are anonymous without one.
    pub token: Option<String>,
    /// Scheme prefixed to the token in the `Authorization` header.
    #[validate(length(min = 1, max = 32))]
    pub auth_scheme: String,
    /// Language tag sent as `Accept-Language`.
    #[validate(custom(function = "validate_locale"))]
    pub locale: Option<String>,
    /// Per-request HTTP timeout; `null` disables it.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>", no_default)]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Option<Duration>,
    /// Upper bound on a whole optimistic operation; `null` (the default) waits forever.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>", no_default)]
    #[serde(rename = "operation_timeout_ms")]
    pub operation_timeout: Option<Duration>,
    /// Buffer size of the notification channel.
    #[validate(range(min = 1, max = 4096))]
    pub notification_capacity: usize,
    /// How many settled operations the store remembers for idempotent reconciliation.
    #[validate(range(min = 1, max = 65536))]
    pub settled_history: usize,
    /// Items requested per listing page.
    #[validate(range(min = 1, max = 100))]
    pub page_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            locale: None,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            operation_timeout: None,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            settled_history: DEFAULT_SETTLED_HISTORY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Load the configuration from disk, falling back to built-in defaults when the file is
    /// missing or unreadable, then apply environment overrides and validate the result.
    pub fn load() -> Result<Self, ConfigError> {
        let path = resolve_config_path();
        let config = match Self::from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), api_url = %config.api_url, "loaded client config");
                config
            }
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load config; falling back to defaults"
                );
                Self::default()
            }
        };

        let config = config.with_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without applying defaults for a missing file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides read through `lookup`; empty values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = url;
        }
        if let Some(token) = lookup(API_TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(locale) = lookup(LOCALE_ENV) {
            self.locale = Some(locale);
        }
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Accepts simple language tags such as `en`, `ru` or `pt-BR`.
fn validate_locale(locale: &str) -> Result<(), ValidationError> {
    let mut parts = locale.split('-');
    let primary = parts.next().unwrap_or_default();
    let primary_ok = (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic());
    let rest_ok = parts.all(|part| {
        (1..=8).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric())
    });

    if primary_ok && rest_ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("locale_format");
        err.message = Some(format!("`{locale}` is not a valid language tag").into());
        Err(err)
    }
}
