use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    gateway::{ErrorKind, FieldErrors, GatewayError},
    state::{EntityRef, OperationId},
};

/// Errors returned by dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The targeted resource does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),
    /// The server (or local validation) rejected the input.
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    /// Network, server or decoding failure; the operation was rolled back.
    #[error("request failed")]
    Transient(#[source] GatewayError),
    /// The operation exceeded the configured timeout and was rolled back.
    #[error("operation timed out")]
    Timeout,
    /// The command cannot be planned against the current state.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The command targets an entity the store does not hold.
    #[error("entity `{0}` is not loaded")]
    MissingEntity(EntityRef),
    /// `undo()` was called without a snapshot.
    #[error("nothing to undo")]
    NothingToUndo,
}

impl DispatchError {
    /// Classification used by notifications and bulk reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound(_) => ErrorKind::NotFound,
            DispatchError::Validation(_) | DispatchError::InvalidInput(_) => {
                ErrorKind::ValidationFailure
            }
            DispatchError::Transient(_)
            | DispatchError::Timeout
            | DispatchError::MissingEntity(_)
            | DispatchError::NothingToUndo => ErrorKind::TransientFailure,
        }
    }

    /// Field messages, for validation failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            DispatchError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<GatewayError> for DispatchError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { path } => DispatchError::NotFound(path),
            GatewayError::Validation { errors, .. } => DispatchError::Validation(errors),
            other => DispatchError::Transient(other),
        }
    }
}

impl From<ValidationErrors> for DispatchError {
    fn from(err: ValidationErrors) -> Self {
        let mut errors = FieldErrors::default();
        for (field, failures) in err.field_errors() {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| failure.code.to_string());
                errors.add(field.to_string(), message);
            }
        }
        DispatchError::Validation(errors)
    }
}

/// One item of a bulk action that did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    /// Item that failed.
    pub target: EntityRef,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
}

/// Outcome of a bulk action or of an undo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkReport {
    /// Items that went through.
    pub succeeded: Vec<EntityRef>,
    /// Items that did not.
    pub failed: Vec<BulkFailure>,
    /// Operations issued for the items, in submission order.
    pub operations: Vec<OperationId>,
}

impl BulkReport {
    /// Whether every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// `PartialBulkFailure` when some items failed, `None` when all succeeded.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        if self.failed.is_empty() {
            None
        } else if self.succeeded.is_empty() {
            self.failed.first().map(|failure| failure.kind)
        } else {
            Some(ErrorKind::PartialBulkFailure)
        }
    }

    pub(crate) fn record(&mut self, target: EntityRef, result: &Result<(), DispatchError>) {
        match result {
            Ok(()) => self.succeeded.push(target),
            Err(err) => self.failed.push(BulkFailure {
                target,
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}
