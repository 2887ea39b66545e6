//! Error types for clause selection and stack transitions.
//!
//! Only selection-layer failures live here. An unhandled message is not an
//! error (it is reported upward as a [`Disposition`]), and handler-internal
//! failures belong to the owning actor's failure path.
//!
//! [`Disposition`]: crate::stack::Disposition

use thiserror::Error;

/// Boxed error produced by a failing guard predicate.
pub type GuardError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised by the matching and stack layers.
#[derive(Debug, Error)]
pub enum BehaviorError {
    /// A guard predicate failed while a clause was being selected. Matching
    /// for the current message is aborted; the error propagates to the
    /// owning actor's failure path.
    #[error("Guard evaluation failed while matching {message_type}: {source}")]
    GuardFailure {
        message_type: &'static str,
        source: GuardError,
    },

    /// `apply` was invoked for a message no clause is defined at. A
    /// precondition violation: callers check `is_defined_at` first.
    #[error("No clause is defined at {message_type}; apply requires a prior is_defined_at")]
    UnmatchedMessage { message_type: &'static str },

    /// `unbecome` attempted to pop the floor behavior.
    #[error("Behavior stack underflow: cannot unbecome past the floor behavior of {actor_id}")]
    StackUnderflow { actor_id: String },
}

impl BehaviorError {
    /// Create a guard failure for the message type being matched.
    pub fn guard_failure(message_type: &'static str, source: GuardError) -> Self {
        Self::GuardFailure {
            message_type,
            source,
        }
    }

    /// Create an unmatched-message precondition violation.
    pub fn unmatched(message_type: &'static str) -> Self {
        Self::UnmatchedMessage { message_type }
    }

    /// Create a stack underflow for the given actor.
    pub fn stack_underflow(actor_id: impl Into<String>) -> Self {
        Self::StackUnderflow {
            actor_id: actor_id.into(),
        }
    }

    /// True for guard failures, the only selection error carrying a source.
    pub fn is_guard_failure(&self) -> bool {
        matches!(self, Self::GuardFailure { .. })
    }
}

/// Result type for matching and stack operations.
pub type BehaviorResult<T> = std::result::Result<T, BehaviorError>;
