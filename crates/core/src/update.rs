//! Closed set of update operations, one variant per entity kind.

use serde::{Deserialize, Serialize};
use crate::assignment::AssignmentUpdate;
use crate::dependency::DependencyType;
use crate::id::{AssignmentId, DependencyId, StepId};
use crate::step::StepCategory;

/// An update routed to exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Update {
    /// Change a step
    Step {
        /// Target step
        id: StepId,
        /// What to change
        change: StepUpdate,
    },
    /// Change an assignment
    Assignment {
        /// Target assignment
        id: AssignmentId,
        /// What to change
        change: AssignmentChange,
    },
    /// Change a dependency edge
    Dependency {
        /// Target edge
        id: DependencyId,
        /// What to change
        change: DependencyUpdate,
    },
}

/// Mutations allowed on a step that no schedule entry references yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum StepUpdate {
    /// New advisory sequence number
    Resequence(u32),
    /// New category
    Recategorize(StepCategory),
}

/// Assignment operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AssignmentChange {
    /// `not_started -> in_progress`
    Start,
    /// Output and/or notes while the assignment is open
    Progress(AssignmentUpdate),
    /// `in_progress -> completed`
    Complete {
        /// Final cumulative output
        actual_output: u32,
        /// Closing notes
        #[serde(default)]
        notes: Option<String>,
    },
}

/// Mutations on an existing dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum DependencyUpdate {
    /// New lag in seconds
    SetLag(u32),
    /// New edge semantics
    SetType(DependencyType),
}
