//! Task state aggregation over worker assignments.

use serde::Serialize;
use shopfloor_core::{ScheduleEntry, TaskStatus, TaskWorkerAssignment};

/// A task's lifecycle state and combined output, derived on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputedTaskState {
    /// Aggregated status
    pub status: TaskStatus,
    /// Sum of all assignment outputs
    pub total_actual_output: u64,
}

/// Compute the overall state of a schedule entry.
///
/// Without assignments the entry's legacy status and output pass through.
/// Otherwise the task is `completed` only when every assignment is, `not_started`
/// only when every assignment is, and `in_progress` in all other cases
/// (including a mix of completed and not-started workers).
pub fn compute_task_state(entry: &ScheduleEntry, assignments: &[TaskWorkerAssignment]) -> ComputedTaskState {
    if assignments.is_empty() {
        return ComputedTaskState {
            status: entry.status,
            total_actual_output: u64::from(entry.actual_output),
        };
    }

    let total_actual_output: u64 = assignments.iter().map(|a| u64::from(a.actual_output)).sum();

    let status = if assignments.iter().all(|a| a.status == TaskStatus::Completed) {
        TaskStatus::Completed
    } else if assignments.iter().all(|a| a.status == TaskStatus::NotStarted) {
        TaskStatus::NotStarted
    } else {
        TaskStatus::InProgress
    };

    ComputedTaskState { status, total_actual_output }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use proptest::prelude::*;
    use shopfloor_core::{EntryId, ProductId, StepId, WorkerId};

    fn entry(status: TaskStatus, output: u32) -> ScheduleEntry {
        ScheduleEntry {
            id: EntryId::new(),
            product_id: ProductId::new(),
            order_ref: None,
            step_id: StepId::new(),
            date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            planned_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            planned_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            planned_output: 100,
            status,
            actual_output: output,
            actual_start: None,
            actual_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assignment(entry_id: EntryId, status: TaskStatus, output: u32) -> TaskWorkerAssignment {
        let mut a = TaskWorkerAssignment::new(entry_id, WorkerId::new("w"), Utc::now());
        a.status = status;
        a.actual_output = output;
        a
    }

    #[test]
    fn test_legacy_passthrough() {
        let e = entry(TaskStatus::InProgress, 42);
        let state = compute_task_state(&e, &[]);
        assert_eq!(state, ComputedTaskState { status: TaskStatus::InProgress, total_actual_output: 42 });
    }

    #[test]
    fn test_outputs_are_summed() {
        let e = entry(TaskStatus::NotStarted, 999);
        let assignments = [
            assignment(e.id, TaskStatus::Completed, 12),
            assignment(e.id, TaskStatus::InProgress, 8),
            assignment(e.id, TaskStatus::NotStarted, 0),
        ];
        let state = compute_task_state(&e, &assignments);
        assert_eq!(state.total_actual_output, 20);
        assert_eq!(state.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_sum_exceeds_single_assignment_range() {
        let e = entry(TaskStatus::NotStarted, 0);
        let assignments = [
            assignment(e.id, TaskStatus::InProgress, u32::MAX),
            assignment(e.id, TaskStatus::InProgress, 5),
        ];
        let state = compute_task_state(&e, &assignments);
        assert_eq!(state.total_actual_output, u64::from(u32::MAX) + 5);
    }

    #[test]
    fn test_uniform_statuses() {
        let e = entry(TaskStatus::NotStarted, 0);
        let done = [
            assignment(e.id, TaskStatus::Completed, 5),
            assignment(e.id, TaskStatus::Completed, 7),
        ];
        assert_eq!(compute_task_state(&e, &done).status, TaskStatus::Completed);

        let idle = [
            assignment(e.id, TaskStatus::NotStarted, 0),
            assignment(e.id, TaskStatus::NotStarted, 0),
        ];
        assert_eq!(compute_task_state(&e, &idle).status, TaskStatus::NotStarted);
    }

    #[test]
    fn test_completed_and_not_started_is_in_progress() {
        let e = entry(TaskStatus::NotStarted, 0);
        let mixed = [
            assignment(e.id, TaskStatus::Completed, 30),
            assignment(e.id, TaskStatus::NotStarted, 0),
        ];
        assert_eq!(compute_task_state(&e, &mixed).status, TaskStatus::InProgress);
    }

    fn status_strategy() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::NotStarted),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
        ]
    }

    proptest! {
        #[test]
        fn prop_status_rules(statuses in prop::collection::vec(status_strategy(), 1..8)) {
            let e = entry(TaskStatus::NotStarted, 0);
            let assignments: Vec<_> = statuses.iter().map(|s| assignment(e.id, *s, 1)).collect();
            let state = compute_task_state(&e, &assignments);

            let expected = if statuses.iter().all(|s| *s == TaskStatus::Completed) {
                TaskStatus::Completed
            } else if statuses.iter().all(|s| *s == TaskStatus::NotStarted) {
                TaskStatus::NotStarted
            } else {
                TaskStatus::InProgress
            };
            prop_assert_eq!(state.status, expected);
            prop_assert_eq!(state.total_actual_output as usize, statuses.len());
        }
    }
}
