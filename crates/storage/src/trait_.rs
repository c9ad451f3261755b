//! Storage trait abstraction.

use async_trait::async_trait;
use shopfloor_core::{
    AssignmentId, DependencyId, EntryFilter, EntryId, OutputObservation, ProductId,
    ScheduleEntry, Step, StepDependency, StepId, TaskWorkerAssignment,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<StorageError> for shopfloor_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => shopfloor_core::Error::NotFound(what),
            other => shopfloor_core::Error::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction for shopfloor data.
///
/// This trait allows different storage backends to be plugged in.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Step operations ===

    /// Save a step (create or update).
    async fn save_step(&mut self, step: &Step) -> Result<()>;

    /// Load a step by ID.
    async fn load_step(&self, id: StepId) -> Result<Option<Step>>;

    /// List the steps of one product.
    async fn list_steps(&self, product_id: ProductId) -> Result<Vec<Step>>;

    // === Dependency operations ===

    /// Save a dependency edge (create or update).
    async fn save_dependency(&mut self, dependency: &StepDependency) -> Result<()>;

    /// Load a dependency edge by ID.
    async fn load_dependency(&self, id: DependencyId) -> Result<Option<StepDependency>>;

    /// List every dependency edge of one product.
    async fn list_dependencies(&self, product_id: ProductId) -> Result<Vec<StepDependency>>;

    /// Delete a dependency edge. Fails with `NotFound` if it does not exist.
    async fn delete_dependency(&mut self, id: DependencyId) -> Result<()>;

    // === Schedule entry operations ===

    /// Save a schedule entry (create or update).
    async fn save_entry(&mut self, entry: &ScheduleEntry) -> Result<()>;

    /// Load a schedule entry by ID.
    async fn load_entry(&self, id: EntryId) -> Result<Option<ScheduleEntry>>;

    /// List schedule entries matching the filter.
    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<ScheduleEntry>>;

    // === Assignment operations ===

    /// Save an assignment (create or update) without touching observations.
    async fn save_assignment(&mut self, assignment: &TaskWorkerAssignment) -> Result<()>;

    /// Load an assignment by ID.
    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<TaskWorkerAssignment>>;

    /// List the assignments of one schedule entry, oldest first.
    async fn list_assignments(&self, entry_id: EntryId) -> Result<Vec<TaskWorkerAssignment>>;

    /// Delete an assignment. Fails with `NotFound` if it does not exist.
    async fn delete_assignment(&mut self, id: AssignmentId) -> Result<()>;

    // === Observation operations ===

    /// Write an assignment and append one observation as a single unit.
    ///
    /// Either both are persisted or neither is.
    async fn record_assignment_progress(
        &mut self,
        assignment: &TaskWorkerAssignment,
        observation: &OutputObservation,
    ) -> Result<()>;

    /// List the observations of one assignment ordered by `recorded_at`.
    async fn list_observations(&self, assignment_id: AssignmentId) -> Result<Vec<OutputObservation>>;
}
