//! Shopfloor core data models.
//!
//! Steps, typed step dependencies, schedule entries, worker assignments and
//! the output observations recorded against them, plus the error taxonomy
//! every shopfloor service returns.

#![warn(missing_docs)]

mod id;
mod error;

// Process definition
mod step;
mod dependency;

// Execution tracking
mod schedule;
mod assignment;
mod observation;
mod update;

pub use id::*;
pub use error::{Error, Result};

pub use step::{Step, NewStep, StepCategory, StepWithDependencies, DependencyRef};
pub use dependency::{StepDependency, DependencyType, DependencySpec};
pub use schedule::{ScheduleEntry, NewScheduleEntry, TaskStatus, EntryFilter};
pub use assignment::{TaskWorkerAssignment, AssignmentUpdate};
pub use observation::OutputObservation;
pub use update::{Update, StepUpdate, AssignmentChange, DependencyUpdate};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
