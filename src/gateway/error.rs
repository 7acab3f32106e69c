//! Error types and response classification for API calls.

use std::error::Error as StdError;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Convenient result alias returning [`GatewayError`] failures.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed transport error, independent of the HTTP client in use.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// How a failure should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The resource does not exist; callers redirect instead of retrying.
    NotFound,
    /// The API rejected the input with field-level messages.
    ValidationFailure,
    /// Anything else: server errors, transport failures, timeouts.
    TransientFailure,
    /// Some items of a bulk operation failed while others succeeded.
    PartialBulkFailure,
}

/// Field-level messages decoded from a 4xx body, in the order the API sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, Vec<String>>);

impl FieldErrors {
    /// Decode a structured error body: a JSON object mapping fields to a message or a list
    /// of messages. Returns `None` for anything else.
    pub fn from_body(body: &Value) -> Option<Self> {
        let Value::Object(object) = body else {
            return None;
        };

        let mut errors = IndexMap::new();
        for (field, messages) in object {
            let messages = match messages {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(message) => Some(message.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect(),
                Value::Null => continue,
                other => vec![other.to_string()],
            };
            if !messages.is_empty() {
                errors.insert(field.clone(), messages);
            }
        }

        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// Append a message for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Every field with its messages, in server order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Whether no field carries a message.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Failures that can occur while talking to the REST API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The API answered 404.
    #[error("resource not found: `{path}`")]
    NotFound { path: String },
    /// The API rejected the request with a structured error body.
    #[error("request to `{path}` rejected with status {status}")]
    Validation {
        path: String,
        status: u16,
        errors: FieldErrors,
    },
    /// The API returned an unexpected status code.
    #[error("unexpected API response status {status} for `{path}`")]
    Status {
        path: String,
        status: u16,
        body: Option<Value>,
    },
    /// The request could not be sent or the response could not be read.
    #[error("failed to send API request to `{path}`")]
    Transport {
        path: String,
        #[source]
        source: BoxError,
    },
    /// The configured request timeout elapsed.
    #[error("API request to `{path}` timed out")]
    Timeout { path: String },
    /// A 2xx response body was not valid JSON of the expected shape.
    #[error("failed to decode API response for `{path}`")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The request body could not be encoded.
    #[error("invalid request body for `{path}`: {reason}")]
    InvalidBody { path: String, reason: String },
    /// Building the HTTP client failed (invalid TLS setup, bad header values, etc).
    #[error("failed to build API client: {reason}")]
    ClientBuilder { reason: String },
}

impl GatewayError {
    /// Classify a non-2xx response.
    pub fn from_status(path: impl Into<String>, status: u16, body: Option<Value>) -> Self {
        let path = path.into();
        if status == 404 {
            return GatewayError::NotFound { path };
        }
        if (400..500).contains(&status) {
            if let Some(errors) = body.as_ref().and_then(FieldErrors::from_body) {
                return GatewayError::Validation {
                    path,
                    status,
                    errors,
                };
            }
        }
        GatewayError::Status { path, status, body }
    }

    /// Coarse classification of the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound { .. } => ErrorKind::NotFound,
            GatewayError::Validation { .. } => ErrorKind::ValidationFailure,
            GatewayError::Status { .. }
            | GatewayError::Transport { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::Decode { .. }
            | GatewayError::InvalidBody { .. }
            | GatewayError::ClientBuilder { .. } => ErrorKind::TransientFailure,
        }
    }

    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::NotFound { .. } => Some(404),
            GatewayError::Validation { status, .. } | GatewayError::Status { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Request path the error relates to.
    pub fn path(&self) -> Option<&str> {
        match self {
            GatewayError::NotFound { path }
            | GatewayError::Validation { path, .. }
            | GatewayError::Status { path, .. }
            | GatewayError::Transport { path, .. }
            | GatewayError::Timeout { path }
            | GatewayError::Decode { path, .. }
            | GatewayError::InvalidBody { path, .. } => Some(path),
            GatewayError::ClientBuilder { .. } => None,
        }
    }
}
