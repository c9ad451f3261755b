//! Schedule entry model - one step scheduled on one date.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use crate::id::{EntryId, ProductId, StepId};
use crate::Time;

/// One step, scheduled for one calendar date, with a planned window and
/// planned output.
///
/// `status`, `actual_output`, `actual_start` and `actual_end` are the legacy
/// single-worker fields. They are authoritative only while the entry has no
/// worker assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique identifier
    pub id: EntryId,

    /// Product being built
    pub product_id: ProductId,

    /// Customer order reference, if the scheduler supplied one
    pub order_ref: Option<String>,

    /// Scheduled step
    pub step_id: StepId,

    /// Calendar date
    pub date: NaiveDate,

    /// Planned window start
    pub planned_start: NaiveTime,

    /// Planned window end
    pub planned_end: NaiveTime,

    /// Planned output in pieces, always > 0
    pub planned_output: u32,

    /// Legacy status
    pub status: TaskStatus,

    /// Legacy output
    pub actual_output: u32,

    /// Legacy actual start
    pub actual_start: Option<NaiveTime>,

    /// Legacy actual end
    pub actual_end: Option<NaiveTime>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

/// Schedule entry as produced by the external scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduleEntry {
    /// Product being made
    pub product_id: ProductId,
    /// Production order reference
    #[serde(default)]
    pub order_ref: Option<String>,
    /// Scheduled step; must belong to the product
    pub step_id: StepId,
    /// Work date
    pub date: NaiveDate,
    /// Planned window start
    pub planned_start: NaiveTime,
    /// Planned window end; must be after the start
    pub planned_end: NaiveTime,
    /// Planned pieces; must be positive
    pub planned_output: u32,
}

/// Lifecycle state shared by schedule entries and worker assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Nothing has happened yet
    NotStarted,
    /// Work is underway
    InProgress,
    /// Work is finished
    Completed,
}

impl TaskStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(crate::Error::validation(format!("unknown status '{}'", other))),
        }
    }
}

/// Filter for querying schedule entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Filter by product
    pub product_id: Option<ProductId>,

    /// Filter by step
    pub step_id: Option<StepId>,

    /// Filter by date
    pub date: Option<NaiveDate>,

    /// Filter by legacy status
    pub status: Option<Vec<TaskStatus>>,
}

impl EntryFilter {
    /// Entries referencing one step.
    pub fn for_step(step_id: StepId) -> Self {
        Self { step_id: Some(step_id), ..Default::default() }
    }

    /// Whether an entry passes this filter.
    pub fn matches(&self, entry: &ScheduleEntry) -> bool {
        self.product_id.map_or(true, |p| entry.product_id == p)
            && self.step_id.map_or(true, |s| entry.step_id == s)
            && self.date.map_or(true, |d| entry.date == d)
            && self.status.as_ref().map_or(true, |s| s.contains(&entry.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ScheduleEntry {
        ScheduleEntry {
            id: EntryId::new(),
            product_id: ProductId::new(),
            order_ref: None,
            step_id: StepId::new(),
            date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            planned_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            planned_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            planned_output: 400,
            status: TaskStatus::NotStarted,
            actual_output: 0,
            actual_start: None,
            actual_end: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_default_filter_matches_everything() {
        assert!(EntryFilter::default().matches(&entry()));
    }

    #[test]
    fn test_filter_by_step_and_status() {
        let e = entry();
        assert!(EntryFilter::for_step(e.step_id).matches(&e));
        assert!(!EntryFilter::for_step(StepId::new()).matches(&e));

        let filter = EntryFilter {
            status: Some(vec![TaskStatus::Completed]),
            ..Default::default()
        };
        assert!(!filter.matches(&e));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
    }
}
