//! Unique identifiers for shopfloor entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

ulid_id!(
    /// Unique identifier for a Product
    ProductId
);

ulid_id!(
    /// Unique identifier for a Step
    StepId
);

ulid_id!(
    /// Unique identifier for a StepDependency edge
    DependencyId
);

ulid_id!(
    /// Unique identifier for a ScheduleEntry
    EntryId
);

ulid_id!(
    /// Unique identifier for a TaskWorkerAssignment
    AssignmentId
);

ulid_id!(
    /// Unique identifier for an OutputObservation
    ObservationId
);

/// Reference to a worker. Workers live outside this system, so the
/// reference is whatever the roster uses (badge number, name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new worker reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_through_display() {
        let id = StepId::new();
        let parsed: StepId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!("not-a-ulid".parse::<EntryId>().is_err());
    }
}
