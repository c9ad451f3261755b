//! Schedule Entries
//!
//! Intake of scheduler output and the read model that joins steps, worker
//! assignments and productivity analytics.

#![warn(missing_docs)]

pub mod view;
pub mod service;

pub use view::{AssignmentView, ScheduleEntryView, Updated};
pub use service::{BasicScheduleService, ScheduleConfig, ScheduleService};
