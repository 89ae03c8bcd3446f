use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::lifecycle::InvalidTransition;
use crate::identifier::IdentifierError;
use crate::money::Money;
use crate::sequence::SequenceError;

/// Failure raised by a repository backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed since it was read")]
    StaleVersion,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Boundary validation failure for an incoming payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Error taxonomy surfaced by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("sequence overflow: {0}")]
    SequenceOverflow(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("application {application} already reviewed ({status})")]
    AlreadyReviewed {
        application: String,
        status: &'static str,
    },
    #[error("loan {loan} is {status}; repayments require an approved or active loan")]
    InvalidLoanState { loan: String, status: &'static str },
    #[error("repayment of {requested} exceeds remaining balance {remaining}")]
    OverPayment { requested: Money, remaining: Money },
    #[error("membership {membership} is {status}; only approved members may apply")]
    MembershipNotApproved {
        membership: String,
        status: &'static str,
    },
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::SequenceOverflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::InvalidTransition(_)
            | EngineError::AlreadyReviewed { .. }
            | EngineError::InvalidLoanState { .. }
            | EngineError::OverPayment { .. }
            | EngineError::MembershipNotApproved { .. } => StatusCode::CONFLICT,
        }
    }

    /// Message safe to show to end users; infrastructure detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            EngineError::StoreUnavailable(_) => {
                "service temporarily unavailable, retry later".to_string()
            }
            EngineError::SequenceOverflow(_) => "identifier space exhausted".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<SequenceError> for EngineError {
    fn from(value: SequenceError) -> Self {
        match value {
            SequenceError::Unavailable(detail) => EngineError::StoreUnavailable(detail),
            exhausted @ SequenceError::Exhausted { .. } => {
                EngineError::SequenceOverflow(exhausted.to_string())
            }
        }
    }
}

impl From<IdentifierError> for EngineError {
    fn from(value: IdentifierError) -> Self {
        match value {
            defect @ (IdentifierError::SequenceOverflow { .. }
            | IdentifierError::ZeroWidth { .. }) => {
                EngineError::SequenceOverflow(defect.to_string())
            }
            malformed @ IdentifierError::Malformed { .. } => {
                EngineError::Validation(ValidationError::new("identifier", malformed.to_string()))
            }
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => EngineError::not_found("record", "(unknown)"),
            RepositoryError::Unavailable(detail) => EngineError::StoreUnavailable(detail),
            conflict @ (RepositoryError::Conflict | RepositoryError::StaleVersion) => {
                EngineError::StoreUnavailable(conflict.to_string())
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "engine request failed");
        }
        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_detail_is_not_leaked() {
        let err = EngineError::StoreUnavailable("mongo replica set offline".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.public_message().contains("mongo"));
    }

    #[test]
    fn guard_violations_are_conflicts_naming_the_state() {
        let err = EngineError::AlreadyReviewed {
            application: "APP-0000001".to_string(),
            status: "approved",
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.public_message().contains("already reviewed"));
        assert!(err.public_message().contains("approved"));
    }

    #[test]
    fn sequence_failures_map_onto_taxonomy() {
        let unavailable: EngineError = SequenceError::Unavailable("down".to_string()).into();
        assert!(matches!(unavailable, EngineError::StoreUnavailable(_)));

        let overflow: EngineError = IdentifierError::SequenceOverflow {
            prefix: "LN".to_string(),
            value: 10_000_000,
            width: 7,
        }
        .into();
        assert!(matches!(overflow, EngineError::SequenceOverflow(_)));
    }
}
