//! Read-model projections returned to callers.

use serde::Serialize;
use shopfloor_core::{ScheduleEntry, Step, StepDependency, TaskStatus, TaskWorkerAssignment};
use shopfloor_progress::{Efficiency, TimeMetrics};

/// A worker assignment with its analytics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentView {
    /// The assignment record
    #[serde(flatten)]
    pub assignment: TaskWorkerAssignment,

    /// Pace analytics from the output history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TimeMetrics>,

    /// Efficiency over the worked window, once the window is closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<Efficiency>,
}

/// A schedule entry joined with its step and aggregated assignment state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntryView {
    /// The stored entry, including legacy status fields
    #[serde(flatten)]
    pub entry: ScheduleEntry,

    /// The scheduled step
    pub step: Step,

    /// Worker assignments, oldest first
    pub assignments: Vec<AssignmentView>,

    /// Status derived from the assignments, or the legacy status
    pub computed_status: TaskStatus,

    /// Output summed over assignments, or the legacy output
    pub total_actual_output: u64,

    /// Efficiency of a single-worker entry with a recorded window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<Efficiency>,
}

/// Post-state returned from a routed update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Updated {
    /// The step after the change
    Step(Step),
    /// The assignment after the change
    Assignment(TaskWorkerAssignment),
    /// The dependency edge after the change
    Dependency(StepDependency),
}
