//! Participant call errors.

use std::time::Duration;

use thiserror::Error;

/// Classified failure of a single call to a resource manager.
///
/// None of these are fatal to a coordinator: every variant drives the
/// abort or compensation path of the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParticipantError {
    /// The resource manager answered with a non-success status.
    #[error("HTTP {status}: {details}")]
    Rejected { status: u16, details: String },

    /// The request never got a response (connection refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The per-call deadline elapsed before a response arrived.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// A success response whose body could not be read.
    #[error("unreadable response: {0}")]
    Decode(String),

    /// The client was configured with an unusable base URL.
    #[error("invalid resource manager endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ParticipantError {
    pub fn rejected(status: u16, details: impl Into<String>) -> Self {
        ParticipantError::Rejected {
            status,
            details: details.into(),
        }
    }

    /// Returns true if the resource manager explicitly refused the operation.
    ///
    /// Everything else is an unexpected fault: the remote side may or may
    /// not have applied the change.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ParticipantError::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_embeds_status_code() {
        let err = ParticipantError::rejected(400, "Insufficient stock.");
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "HTTP 400: Insufficient stock.");
    }

    #[test]
    fn transport_faults_are_not_rejections() {
        assert!(!ParticipantError::Transport("connection refused".into()).is_rejection());
        assert!(!ParticipantError::Timeout(Duration::from_secs(5)).is_rejection());
        assert!(!ParticipantError::Decode("missing field".into()).is_rejection());
    }
}
