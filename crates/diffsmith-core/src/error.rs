//! Error types for diffsmith core
//!
//! Only two things ever surface as `Err` from a batch run:
//! - decomposition could not reach the text-synthesis service
//! - decomposition produced no task in any category
//!
//! Everything that goes wrong while processing a task is recorded as a
//! [`TaskOutcome`](crate::types::TaskOutcome) instead.

use crate::types::Category;
use ulid::Ulid;

/// Failure of a call to an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Call exceeded its deadline
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Collaborator could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// Collaborator answered with an error
    #[error("service error: {0}")]
    Service(String),

    /// Answer could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local I/O failure
    #[error("i/o error: {0}")]
    Io(String),
}

impl TransportError {
    /// Check if the call timed out
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Task decomposition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompositionError {
    /// The decomposition pass for a category could not be completed
    #[error("decomposing {category} tasks failed: {source}")]
    Transport {
        category: Category,
        #[source]
        source: TransportError,
    },
}

/// Batch-level errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No task in any category; nothing was fetched, synthesized or applied
    #[error("decomposition produced no tasks in any category (session {session})")]
    DecompositionEmpty { session: Ulid },

    /// Decomposition failed
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
}

impl PipelineError {
    /// Check if this is the empty-decomposition abort
    #[inline]
    #[must_use]
    pub fn is_decomposition_empty(&self) -> bool {
        matches!(self, Self::DecompositionEmpty { .. })
    }
}

/// Synthesis attempt errors; both consume one attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// Text-synthesis call failed or timed out
    #[error("synthesis call failed: {0}")]
    Transport(#[from] TransportError),

    /// Output was neither SKIP nor a well-formed diff
    #[error("malformed candidate: {0}")]
    MalformedCandidate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_operation() {
        let err = TransportError::Timeout {
            operation: "dry run".into(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "dry run timed out after 30s");
        assert!(err.is_timeout());
    }

    #[test]
    fn decomposition_error_converts() {
        let err: PipelineError = DecompositionError::Transport {
            category: Category::Style,
            source: TransportError::Connection("refused".into()),
        }
        .into();
        assert!(!err.is_decomposition_empty());
        assert_eq!(
            err.to_string(),
            "decomposing style tasks failed: connection failed: refused"
        );
    }
}
