//! Error taxonomy shared by every shopfloor service.
//!
//! All variants are expected outcomes of normal operation. Callers branch on
//! the kind; nothing here is meant to abort the process.

use std::fmt;

/// Result type used across the shopfloor crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by shopfloor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A graph mutation would close a dependency cycle.
    #[error("dependency cycle: {}", CyclePath(.path))]
    Cycle {
        /// Step identifiers along the cycle, first and last element equal.
        path: Vec<crate::StepId>,
    },

    /// A state transition was requested from a state that does not allow it.
    #[error("cannot {action} {entity} while {from}")]
    InvalidTransition {
        /// Entity kind ("assignment", "schedule entry").
        entity: &'static str,
        /// Current state.
        from: String,
        /// Attempted action.
        action: &'static str,
    },

    /// Malformed or inconsistent input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether this error is a rejected cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

struct CyclePath<'a>(&'a [crate::StepId]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepId;

    #[test]
    fn test_cycle_message_lists_path() {
        let a = StepId::new();
        let b = StepId::new();
        let err = Error::Cycle { path: vec![a, b, a] };
        assert_eq!(err.to_string(), format!("dependency cycle: {} -> {} -> {}", a, b, a));
        assert!(err.is_cycle());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = Error::InvalidTransition {
            entity: "assignment",
            from: "completed".to_string(),
            action: "start",
        };
        assert_eq!(err.to_string(), "cannot start assignment while completed");
    }
}
