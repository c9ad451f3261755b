//! Progress Tracking
//!
//! Worker assignment transitions, task state aggregation and productivity
//! analytics over output observations.

#![warn(missing_docs)]

pub mod aggregator;
pub mod tracker;
pub mod metrics;
pub mod efficiency;
pub mod history;

pub use aggregator::{compute_task_state, ComputedTaskState};
pub use tracker::{AssignmentTracker, LegacyProgress, TrackerConfig};
pub use metrics::{compute_time_metrics, MetricsSummary, SegmentStats, TimeMetrics};
pub use efficiency::{compute_efficiency, parse_clock, Efficiency, EfficiencyInput, EfficiencyReport};
pub use history::{record_efficiency, summarize_by_worker, ProductionRecord, RecordEfficiency, WorkerSummary};
