//! Worker assignment model - one worker's participation in a schedule entry.

use serde::{Deserialize, Serialize};
use crate::id::{AssignmentId, EntryId, WorkerId};
use crate::schedule::TaskStatus;
use crate::{Error, Result, Time};

/// One worker's participation in a schedule entry.
///
/// Each assignment is an independent `not_started -> in_progress -> completed`
/// state machine. There are no back-transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWorkerAssignment {
    /// Unique identifier
    pub id: AssignmentId,

    /// Owning schedule entry
    pub entry_id: EntryId,

    /// Assigned worker
    pub worker_id: WorkerId,

    /// Lifecycle status
    pub status: TaskStatus,

    /// When the worker started
    pub actual_start: Option<Time>,

    /// When the worker finished
    pub actual_end: Option<Time>,

    /// Cumulative pieces produced
    pub actual_output: u32,

    /// Free-text notes
    pub notes: Option<String>,

    /// When the worker was added to the task
    pub assigned_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl TaskWorkerAssignment {
    /// A fresh, not-started assignment.
    pub fn new(entry_id: EntryId, worker_id: WorkerId, now: Time) -> Self {
        Self {
            id: AssignmentId::new(),
            entry_id,
            worker_id,
            status: TaskStatus::NotStarted,
            actual_start: None,
            actual_end: None,
            actual_output: 0,
            notes: None,
            assigned_at: now,
            updated_at: now,
        }
    }

    /// `not_started -> in_progress`.
    pub fn start(&mut self, now: Time) -> Result<()> {
        if self.status != TaskStatus::NotStarted {
            return Err(self.invalid("start"));
        }
        self.status = TaskStatus::InProgress;
        self.actual_start = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Set a new cumulative output while in progress.
    ///
    /// Output never decreases while the assignment is in progress.
    pub fn record_output(&mut self, output: u32, now: Time) -> Result<()> {
        if self.status != TaskStatus::InProgress {
            return Err(self.invalid("update output of"));
        }
        if output < self.actual_output {
            return Err(Error::validation(format!(
                "output cannot decrease from {} to {}",
                self.actual_output, output
            )));
        }
        self.actual_output = output;
        self.updated_at = now;
        Ok(())
    }

    /// `in_progress -> completed` with the final cumulative output.
    pub fn complete(&mut self, final_output: u32, now: Time) -> Result<()> {
        if self.status != TaskStatus::InProgress {
            return Err(self.invalid("complete"));
        }
        if final_output == 0 {
            return Err(Error::validation("final output must be greater than zero"));
        }
        self.status = TaskStatus::Completed;
        self.actual_output = final_output;
        self.actual_end = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Whether the assignment may still be hard-removed.
    pub fn is_removable(&self) -> bool {
        self.status == TaskStatus::NotStarted
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            entity: "assignment",
            from: self.status.to_string(),
            action,
        }
    }
}

/// Changes a worker or supervisor may submit for an assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentUpdate {
    /// New cumulative output
    pub actual_output: Option<u32>,

    /// Replacement notes
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assignment() -> TaskWorkerAssignment {
        TaskWorkerAssignment::new(EntryId::new(), WorkerId::new("Cyndi"), Utc::now())
    }

    #[test]
    fn test_full_lifecycle() {
        let mut a = assignment();
        a.start(Utc::now()).unwrap();
        assert_eq!(a.status, TaskStatus::InProgress);
        assert!(a.actual_start.is_some());

        a.record_output(12, Utc::now()).unwrap();
        a.complete(20, Utc::now()).unwrap();
        assert_eq!(a.status, TaskStatus::Completed);
        assert_eq!(a.actual_output, 20);
        assert!(a.actual_end.is_some());
    }

    #[test]
    fn test_start_twice_is_invalid_transition() {
        let mut a = assignment();
        a.start(Utc::now()).unwrap();
        let err = a.start(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { action: "start", .. }));
    }

    #[test]
    fn test_complete_requires_in_progress() {
        let mut a = assignment();
        let err = a.complete(5, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_complete_with_zero_output_is_validation_error() {
        let mut a = assignment();
        a.start(Utc::now()).unwrap();
        let err = a.complete(0, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(a.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_output_cannot_decrease() {
        let mut a = assignment();
        a.start(Utc::now()).unwrap();
        a.record_output(10, Utc::now()).unwrap();
        let err = a.record_output(8, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(a.actual_output, 10);
    }

    #[test]
    fn test_only_not_started_is_removable() {
        let mut a = assignment();
        assert!(a.is_removable());
        a.start(Utc::now()).unwrap();
        assert!(!a.is_removable());
    }
}
