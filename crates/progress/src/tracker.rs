//! Assignment tracking service.
//!
//! Every transition that touches output (start, output update, completion)
//! writes the assignment and appends one observation through
//! [`Storage::record_assignment_progress`], so the two never diverge.

use std::sync::Arc;
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use shopfloor_core::{
    AssignmentId, AssignmentUpdate, EntryId, Error, OutputObservation, Result, ScheduleEntry,
    TaskStatus, TaskWorkerAssignment, WorkerId,
};
use shopfloor_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tracker configuration.
#[derive(Debug, Clone, Default)]
pub struct TrackerConfig {
    /// Allow a final output below the current cumulative output
    pub allow_completion_below_current: bool,
}

impl TrackerConfig {
    /// Set whether completion may lower the cumulative output.
    pub fn with_completion_below_current(mut self, allow: bool) -> Self {
        self.allow_completion_below_current = allow;
        self
    }
}

/// Progress reported directly on an entry that has no worker assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyProgress {
    /// New status
    pub status: TaskStatus,
    /// Cumulative output
    pub actual_output: u32,
    /// Clock time work started
    #[serde(default)]
    pub actual_start: Option<NaiveTime>,
    /// Clock time work ended
    #[serde(default)]
    pub actual_end: Option<NaiveTime>,
}

/// Worker assignment lifecycle service.
pub struct AssignmentTracker<S: Storage> {
    storage: Arc<Mutex<S>>,
    config: TrackerConfig,
}

impl<S: Storage> AssignmentTracker<S> {
    /// Create a new tracker over shared storage.
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self::with_config(storage, TrackerConfig::default())
    }

    /// Create a new tracker with explicit configuration.
    pub fn with_config(storage: Arc<Mutex<S>>, config: TrackerConfig) -> Self {
        Self { storage, config }
    }

    /// Add a worker to a schedule entry as a not-started assignment.
    pub async fn add_worker(&self, entry_id: EntryId, worker_id: WorkerId) -> Result<TaskWorkerAssignment> {
        if worker_id.as_str().trim().is_empty() {
            return Err(Error::validation("worker id must not be empty"));
        }
        let mut storage = self.storage.lock().await;
        let entry = load_entry(&*storage, entry_id).await?;

        let existing = storage.list_assignments(entry_id).await?;
        if existing.is_empty() && entry.status != TaskStatus::NotStarted {
            return Err(Error::validation(format!(
                "entry {} already carries single-worker progress",
                entry_id
            )));
        }
        if existing.iter().any(|a| a.worker_id == worker_id) {
            return Err(Error::validation(format!(
                "worker {} is already assigned to entry {}",
                worker_id, entry_id
            )));
        }

        let assignment = TaskWorkerAssignment::new(entry_id, worker_id, Utc::now());
        storage.save_assignment(&assignment).await?;

        info!("Assigned worker {} to entry {}", assignment.worker_id, entry_id);
        Ok(assignment)
    }

    /// Remove a worker who has not started yet.
    pub async fn remove_worker(&self, id: AssignmentId) -> Result<TaskWorkerAssignment> {
        let mut storage = self.storage.lock().await;
        let assignment = load_assignment(&*storage, id).await?;
        if !assignment.is_removable() {
            return Err(Error::InvalidTransition {
                entity: "assignment",
                from: assignment.status.to_string(),
                action: "remove",
            });
        }
        storage.delete_assignment(id).await?;

        info!("Removed worker {} from entry {}", assignment.worker_id, assignment.entry_id);
        Ok(assignment)
    }

    /// `not_started -> in_progress`.
    pub async fn start(&self, id: AssignmentId) -> Result<TaskWorkerAssignment> {
        let mut storage = self.storage.lock().await;
        let mut assignment = load_assignment(&*storage, id).await?;

        let now = Utc::now();
        assignment.start(now)?;
        commit(&mut *storage, &assignment).await?;

        info!("Worker {} started assignment {}", assignment.worker_id, id);
        Ok(assignment)
    }

    /// Apply an output and/or notes update.
    ///
    /// An output update requires `in_progress` and never lowers the output.
    /// A notes-only update is accepted in any state and records no observation.
    pub async fn update(&self, id: AssignmentId, update: AssignmentUpdate) -> Result<TaskWorkerAssignment> {
        let mut storage = self.storage.lock().await;
        let mut assignment = load_assignment(&*storage, id).await?;
        let now = Utc::now();

        match update.actual_output {
            Some(output) => {
                assignment.record_output(output, now)?;
                if let Some(notes) = update.notes {
                    assignment.notes = Some(notes);
                }
                commit(&mut *storage, &assignment).await?;
                debug!("Assignment {} output now {}", id, assignment.actual_output);
            }
            None => {
                if let Some(notes) = update.notes {
                    assignment.notes = Some(notes);
                    assignment.updated_at = now;
                    storage.save_assignment(&assignment).await?;
                    debug!("Assignment {} notes updated", id);
                }
            }
        }

        Ok(assignment)
    }

    /// `in_progress -> completed` with the final cumulative output.
    pub async fn complete(
        &self,
        id: AssignmentId,
        actual_output: u32,
        notes: Option<String>,
    ) -> Result<TaskWorkerAssignment> {
        let mut storage = self.storage.lock().await;
        let mut assignment = load_assignment(&*storage, id).await?;

        if assignment.status == TaskStatus::InProgress
            && actual_output < assignment.actual_output
            && !self.config.allow_completion_below_current
        {
            return Err(Error::validation(format!(
                "final output {} is below current output {}",
                actual_output, assignment.actual_output
            )));
        }

        let now = Utc::now();
        assignment.complete(actual_output, now)?;
        if notes.is_some() {
            assignment.notes = notes;
        }
        commit(&mut *storage, &assignment).await?;

        info!(
            "Worker {} completed assignment {} with {} pieces",
            assignment.worker_id, id, assignment.actual_output
        );
        Ok(assignment)
    }

    /// Output observations of one assignment in time order.
    pub async fn output_history(&self, id: AssignmentId) -> Result<Vec<OutputObservation>> {
        let storage = self.storage.lock().await;
        load_assignment(&*storage, id).await?;
        Ok(storage.list_observations(id).await?)
    }

    /// Record progress on an entry tracked without worker assignments.
    pub async fn record_legacy_progress(&self, entry_id: EntryId, progress: LegacyProgress) -> Result<ScheduleEntry> {
        let mut storage = self.storage.lock().await;
        let mut entry = load_entry(&*storage, entry_id).await?;

        if !storage.list_assignments(entry_id).await?.is_empty() {
            return Err(Error::validation(format!(
                "entry {} is tracked per worker; update its assignments instead",
                entry_id
            )));
        }
        if rank(progress.status) < rank(entry.status) {
            return Err(Error::InvalidTransition {
                entity: "schedule entry",
                from: entry.status.to_string(),
                action: "move back",
            });
        }
        if progress.actual_output < entry.actual_output {
            return Err(Error::validation(format!(
                "output cannot decrease from {} to {}",
                entry.actual_output, progress.actual_output
            )));
        }
        if let (Some(start), Some(end)) = (progress.actual_start, progress.actual_end) {
            if end <= start {
                return Err(Error::validation("actual end must be after actual start"));
            }
        }

        entry.status = progress.status;
        entry.actual_output = progress.actual_output;
        entry.actual_start = progress.actual_start.or(entry.actual_start);
        entry.actual_end = progress.actual_end.or(entry.actual_end);
        entry.updated_at = Utc::now();
        storage.save_entry(&entry).await?;

        info!("Entry {} now {} with {} pieces", entry_id, entry.status, entry.actual_output);
        Ok(entry)
    }
}

fn rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::NotStarted => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Completed => 2,
    }
}

async fn load_entry<S: Storage>(storage: &S, id: EntryId) -> Result<ScheduleEntry> {
    storage
        .load_entry(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("schedule entry {}", id)))
}

async fn load_assignment<S: Storage>(storage: &S, id: AssignmentId) -> Result<TaskWorkerAssignment> {
    storage
        .load_assignment(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("assignment {}", id)))
}

async fn commit<S: Storage>(storage: &mut S, assignment: &TaskWorkerAssignment) -> Result<()> {
    let observation = OutputObservation::new(assignment.id, assignment.actual_output, assignment.updated_at);
    storage.record_assignment_progress(assignment, &observation).await?;
    debug!(
        "Recorded observation {} for assignment {} at {} pieces",
        observation.id, assignment.id, observation.cumulative_output
    );
    Ok(())
}
