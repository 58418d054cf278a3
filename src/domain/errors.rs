//! Domain errors for the claimwatch engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the claimwatch engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Assignment not found: {0}")]
    AssignmentNotFound(Uuid),

    #[error("Issue not found: {0}")]
    IssueNotFound(Uuid),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Contributor not found: {0}")]
    ContributorNotFound(String),

    #[error("Issue {0} already has an active assignment")]
    ActiveAssignmentExists(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors surfaced by a platform connector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    /// Transient upstream failure (network, 5xx, rate limit, timeout).
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The issue no longer exists upstream.
    #[error("Not found upstream: {0}")]
    NotFound(String),

    /// The platform refused the request and retrying will not help.
    #[error("Rejected by platform ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl ConnectorError {
    /// Whether the caller should retry the operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_error_transience() {
        assert!(ConnectorError::SourceUnavailable("timeout".into()).is_transient());
        assert!(!ConnectorError::NotFound("gone".into()).is_transient());
        assert!(!ConnectorError::Rejected { status: 422, message: "bad".into() }.is_transient());
    }

    #[test]
    fn test_conflict_message() {
        let err = DomainError::ConcurrencyConflict {
            entity: "assignment".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Concurrency conflict: assignment abc was modified");
    }
}
