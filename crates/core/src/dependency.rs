//! Typed precedence edges between steps.

use serde::{Deserialize, Serialize};
use crate::id::{DependencyId, ProductId, StepId};
use crate::Time;

/// A directed edge `from -> to`: `to` depends on `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDependency {
    /// Unique identifier
    pub id: DependencyId,

    /// Product both steps belong to
    pub product_id: ProductId,

    /// Predecessor
    pub from_step: StepId,

    /// Dependent step
    pub to_step: StepId,

    /// Edge semantics
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// Delay after the predecessor finishes. Only meaningful for `finish` edges.
    pub lag_seconds: u32,

    /// Creation timestamp
    pub created_at: Time,
}

impl StepDependency {
    /// Whether this edge has the same endpoints and type as another.
    pub fn same_edge(&self, from: StepId, to: StepId, dep_type: DependencyType) -> bool {
        self.from_step == from && self.to_step == to && self.dep_type == dep_type
    }
}

/// Dependency semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Co-start: the dependent may begin once the predecessor has begun.
    Start,
    /// Strict sequence: the dependent may begin once the predecessor completes, plus lag.
    Finish,
}

impl DependencyType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Start => "start",
            DependencyType::Finish => "finish",
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(DependencyType::Start),
            "finish" => Ok(DependencyType::Finish),
            other => Err(crate::Error::validation(format!("unknown dependency type '{}'", other))),
        }
    }
}

/// Desired incoming dependency of a step, used when replacing a step's full
/// dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Predecessor step
    pub step_id: StepId,

    /// Edge semantics
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// Lag after the predecessor finishes
    #[serde(default)]
    pub lag_seconds: u32,
}

impl DependencySpec {
    /// A `finish` dependency without lag.
    pub fn finish(step_id: StepId) -> Self {
        Self { step_id, dep_type: DependencyType::Finish, lag_seconds: 0 }
    }

    /// A `start` dependency.
    pub fn start(step_id: StepId) -> Self {
        Self { step_id, dep_type: DependencyType::Start, lag_seconds: 0 }
    }

    /// Set the lag.
    pub fn with_lag(mut self, lag_seconds: u32) -> Self {
        self.lag_seconds = lag_seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_type_parse() {
        assert_eq!("FINISH".parse::<DependencyType>().unwrap(), DependencyType::Finish);
        assert_eq!("start".parse::<DependencyType>().unwrap(), DependencyType::Start);
        assert!("after".parse::<DependencyType>().is_err());
    }

    #[test]
    fn test_spec_deserializes_without_lag() {
        let id = StepId::new();
        let json = format!(r#"{{"step_id":"{}","type":"start"}}"#, id);
        let spec: DependencySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, DependencySpec::start(id));
    }
}
