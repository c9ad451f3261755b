//! Schedule service - entry intake, routed updates and the entry read model.

use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use shopfloor_core::{
    AssignmentChange, AssignmentId, AssignmentUpdate, DependencySpec, EntryFilter, EntryId, Error,
    NewScheduleEntry, OutputObservation, ProductId, Result, ScheduleEntry, Step, StepId,
    StepWithDependencies, TaskStatus, TaskWorkerAssignment, Update, WorkerId,
};
use shopfloor_graph::DependencyService;
use shopfloor_progress::{
    compute_efficiency, compute_task_state, compute_time_metrics, AssignmentTracker, Efficiency,
    EfficiencyInput, LegacyProgress, TimeMetrics, TrackerConfig,
};
use shopfloor_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::view::{AssignmentView, ScheduleEntryView, Updated};

/// Read-model configuration.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Attach pace analytics to each assignment
    pub include_metrics: bool,
    /// Attach efficiency to closed windows
    pub include_efficiency: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_efficiency: true,
        }
    }
}

impl ScheduleConfig {
    /// Set whether assignment views carry pace analytics.
    pub fn with_metrics(mut self, include: bool) -> Self {
        self.include_metrics = include;
        self
    }

    /// Set whether views carry efficiency figures.
    pub fn with_efficiency(mut self, include: bool) -> Self {
        self.include_efficiency = include;
        self
    }
}

/// Schedule operations exposed to callers.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    /// Steps of a product with embedded dependencies.
    async fn get_product_steps(&self, product_id: ProductId) -> Result<Vec<StepWithDependencies>>;

    /// Replace a step's incoming dependencies.
    async fn put_step_dependencies(
        &self,
        step_id: StepId,
        dependencies: Vec<DependencySpec>,
    ) -> Result<StepWithDependencies>;

    /// Accept one entry from the external scheduler.
    async fn register_entry(&self, spec: NewScheduleEntry) -> Result<ScheduleEntry>;

    /// Entries matching a filter.
    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<ScheduleEntry>>;

    /// One entry with its step, assignments and computed state.
    async fn get_schedule_entry(&self, id: EntryId) -> Result<ScheduleEntryView>;

    /// Put a worker on an entry.
    async fn add_worker(&self, entry_id: EntryId, worker_id: WorkerId) -> Result<TaskWorkerAssignment>;

    /// Take a not-started worker off an entry.
    async fn remove_worker(&self, id: AssignmentId) -> Result<TaskWorkerAssignment>;

    /// `not_started -> in_progress`.
    async fn start_assignment(&self, id: AssignmentId) -> Result<TaskWorkerAssignment>;

    /// Output and/or notes update.
    async fn update_assignment(&self, id: AssignmentId, update: AssignmentUpdate) -> Result<TaskWorkerAssignment>;

    /// `in_progress -> completed`.
    async fn complete_assignment(
        &self,
        id: AssignmentId,
        actual_output: u32,
        notes: Option<String>,
    ) -> Result<TaskWorkerAssignment>;

    /// Progress on an entry without worker assignments.
    async fn record_legacy_progress(&self, entry_id: EntryId, progress: LegacyProgress) -> Result<ScheduleEntry>;

    /// Observations of one assignment in time order.
    async fn get_assignment_output_history(&self, id: AssignmentId) -> Result<Vec<OutputObservation>>;

    /// Pace analytics of one assignment.
    async fn get_assignment_metrics(&self, id: AssignmentId) -> Result<TimeMetrics>;

    /// Route one tagged update and return the post-state.
    async fn apply(&self, update: Update) -> Result<Updated>;
}

/// Schedule service over a storage backend.
pub struct BasicScheduleService<S: Storage> {
    storage: Arc<Mutex<S>>,
    dependencies: DependencyService<S>,
    tracker: AssignmentTracker<S>,
    config: ScheduleConfig,
}

impl<S: Storage> BasicScheduleService<S> {
    /// Create a new schedule service with default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, ScheduleConfig::default(), TrackerConfig::default())
    }

    /// Create a new schedule service with explicit configuration.
    pub fn with_config(storage: S, config: ScheduleConfig, tracker_config: TrackerConfig) -> Self {
        let storage = Arc::new(Mutex::new(storage));
        Self {
            dependencies: DependencyService::new(Arc::clone(&storage)),
            tracker: AssignmentTracker::with_config(Arc::clone(&storage), tracker_config),
            storage,
            config,
        }
    }

    /// The step and dependency service sharing this storage.
    pub fn dependencies(&self) -> &DependencyService<S> {
        &self.dependencies
    }

    async fn assignment_view(&self, assignment: TaskWorkerAssignment, step: &Step) -> Result<AssignmentView> {
        let metrics = if self.config.include_metrics {
            let observations = self.storage.lock().await.list_observations(assignment.id).await?;
            Some(compute_time_metrics(&observations))
        } else {
            None
        };
        let efficiency = if self.config.include_efficiency {
            assignment_efficiency(&assignment, step)
        } else {
            None
        };
        Ok(AssignmentView { assignment, metrics, efficiency })
    }
}

/// Efficiency over an assignment's closed window, on `HH:MM` clock times.
/// Absent while the window is open; a window crossing a UTC date is not
/// computable.
fn assignment_efficiency(assignment: &TaskWorkerAssignment, step: &Step) -> Option<Efficiency> {
    let (start, end) = (assignment.actual_start?, assignment.actual_end?);
    if start.date_naive() != end.date_naive() {
        return Some(Efficiency::NotComputable {
            reason: "work window spans more than one day".to_string(),
        });
    }
    Some(compute_efficiency(&EfficiencyInput::from_timestamps(
        start,
        end,
        assignment.actual_output,
        step.time_per_piece_seconds,
    )))
}

/// Efficiency of a single-worker entry with both clock times recorded.
fn legacy_efficiency(entry: &ScheduleEntry, step: &Step) -> Option<Efficiency> {
    let (start, end) = (entry.actual_start?, entry.actual_end?);
    Some(compute_efficiency(&EfficiencyInput::from_clock(
        start,
        end,
        entry.actual_output,
        step.time_per_piece_seconds,
    )))
}

#[async_trait]
impl<S: Storage + 'static> ScheduleService for BasicScheduleService<S> {
    async fn get_product_steps(&self, product_id: ProductId) -> Result<Vec<StepWithDependencies>> {
        self.dependencies.get_product_steps(product_id).await
    }

    async fn put_step_dependencies(
        &self,
        step_id: StepId,
        dependencies: Vec<DependencySpec>,
    ) -> Result<StepWithDependencies> {
        self.dependencies.put_step_dependencies(step_id, dependencies).await
    }

    async fn register_entry(&self, spec: NewScheduleEntry) -> Result<ScheduleEntry> {
        if spec.planned_output == 0 {
            return Err(Error::validation("planned output must be greater than zero"));
        }
        if spec.planned_end <= spec.planned_start {
            return Err(Error::validation(format!(
                "planned end {} is not after planned start {}",
                spec.planned_end, spec.planned_start
            )));
        }

        let mut storage = self.storage.lock().await;
        let step = storage
            .load_step(spec.step_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("step {}", spec.step_id)))?;
        if step.product_id != spec.product_id {
            return Err(Error::validation(format!(
                "step {} does not belong to product {}",
                step.id, spec.product_id
            )));
        }

        let now = Utc::now();
        let entry = ScheduleEntry {
            id: EntryId::new(),
            product_id: spec.product_id,
            order_ref: spec.order_ref,
            step_id: spec.step_id,
            date: spec.date,
            planned_start: spec.planned_start,
            planned_end: spec.planned_end,
            planned_output: spec.planned_output,
            status: TaskStatus::NotStarted,
            actual_output: 0,
            actual_start: None,
            actual_end: None,
            created_at: now,
            updated_at: now,
        };
        storage.save_entry(&entry).await?;

        info!("Registered entry {} for step '{}' on {}", entry.id, step.name, entry.date);
        Ok(entry)
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<ScheduleEntry>> {
        Ok(self.storage.lock().await.list_entries(filter).await?)
    }

    async fn get_schedule_entry(&self, id: EntryId) -> Result<ScheduleEntryView> {
        let (entry, step, assignments) = {
            let storage = self.storage.lock().await;
            let entry = storage
                .load_entry(id)
                .await?
                .ok_or_else(|| Error::not_found(format!("schedule entry {}", id)))?;
            let step = storage
                .load_step(entry.step_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("step {}", entry.step_id)))?;
            let assignments = storage.list_assignments(id).await?;
            (entry, step, assignments)
        };

        let state = compute_task_state(&entry, &assignments);
        let efficiency = if self.config.include_efficiency && assignments.is_empty() {
            legacy_efficiency(&entry, &step)
        } else {
            None
        };

        let mut views = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            views.push(self.assignment_view(assignment, &step).await?);
        }

        debug!("Entry {} computed as {} with {} pieces", id, state.status, state.total_actual_output);
        Ok(ScheduleEntryView {
            entry,
            step,
            assignments: views,
            computed_status: state.status,
            total_actual_output: state.total_actual_output,
            efficiency,
        })
    }

    async fn add_worker(&self, entry_id: EntryId, worker_id: WorkerId) -> Result<TaskWorkerAssignment> {
        self.tracker.add_worker(entry_id, worker_id).await
    }

    async fn remove_worker(&self, id: AssignmentId) -> Result<TaskWorkerAssignment> {
        self.tracker.remove_worker(id).await
    }

    async fn start_assignment(&self, id: AssignmentId) -> Result<TaskWorkerAssignment> {
        self.tracker.start(id).await
    }

    async fn update_assignment(&self, id: AssignmentId, update: AssignmentUpdate) -> Result<TaskWorkerAssignment> {
        self.tracker.update(id, update).await
    }

    async fn complete_assignment(
        &self,
        id: AssignmentId,
        actual_output: u32,
        notes: Option<String>,
    ) -> Result<TaskWorkerAssignment> {
        self.tracker.complete(id, actual_output, notes).await
    }

    async fn record_legacy_progress(&self, entry_id: EntryId, progress: LegacyProgress) -> Result<ScheduleEntry> {
        self.tracker.record_legacy_progress(entry_id, progress).await
    }

    async fn get_assignment_output_history(&self, id: AssignmentId) -> Result<Vec<OutputObservation>> {
        self.tracker.output_history(id).await
    }

    async fn get_assignment_metrics(&self, id: AssignmentId) -> Result<TimeMetrics> {
        let observations = self.tracker.output_history(id).await?;
        Ok(compute_time_metrics(&observations))
    }

    async fn apply(&self, update: Update) -> Result<Updated> {
        match update {
            Update::Step { id, change } => {
                Ok(Updated::Step(self.dependencies.update_step(id, change).await?))
            }
            Update::Dependency { id, change } => {
                Ok(Updated::Dependency(self.dependencies.update_dependency(id, change).await?))
            }
            Update::Assignment { id, change } => {
                let assignment = match change {
                    AssignmentChange::Start => self.tracker.start(id).await?,
                    AssignmentChange::Progress(update) => self.tracker.update(id, update).await?,
                    AssignmentChange::Complete { actual_output, notes } => {
                        self.tracker.complete(id, actual_output, notes).await?
                    }
                };
                Ok(Updated::Assignment(assignment))
            }
        }
    }
}
