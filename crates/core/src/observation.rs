//! Output observations - the append-only time series behind analytics.

use serde::{Deserialize, Serialize};
use crate::id::{AssignmentId, ObservationId};
use crate::Time;

/// Cumulative output of one assignment at one point in time.
///
/// Appended on every start, output update and completion. Never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputObservation {
    /// Unique identifier
    pub id: ObservationId,

    /// Assignment the sample belongs to
    pub assignment_id: AssignmentId,

    /// Cumulative pieces at `recorded_at`
    pub cumulative_output: u32,

    /// When the sample was taken
    pub recorded_at: Time,
}

impl OutputObservation {
    /// Create a new observation.
    pub fn new(assignment_id: AssignmentId, cumulative_output: u32, recorded_at: Time) -> Self {
        Self {
            id: ObservationId::new(),
            assignment_id,
            cumulative_output,
            recorded_at,
        }
    }
}
