use std::time::Duration;

use crate::config::ClientConfig;

/// Scheme used in the `Authorization` header when none is configured.
pub const DEFAULT_AUTH_SCHEME: &str = "Token";

/// Runtime configuration describing how to reach the REST API.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// API root every path is resolved against.
    pub base_url: String,
    /// API token, if authenticated.
    pub token: Option<String>,
    /// Scheme prefixed to the token.
    pub auth_scheme: String,
    /// Value of `Accept-Language`.
    pub locale: Option<String>,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Option<Duration>,
}

impl HttpGatewayConfig {
    /// Construct a configuration for an unauthenticated client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            locale: None,
            request_timeout: None,
        }
    }

    /// Attach an API token sent on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use `scheme` instead of the default `Token`.
    pub fn with_auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    /// Language sent in `Accept-Language`.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Abort requests taking longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl From<&ClientConfig> for HttpGatewayConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_url.clone(),
            token: config.token.clone().filter(|token| !token.is_empty()),
            auth_scheme: config.auth_scheme.clone(),
            locale: config.locale.clone().filter(|locale| !locale.is_empty()),
            request_timeout: config.request_timeout,
        }
    }
}
