//! JSON file storage implementation.
//!
//! Stores every entity as one pretty-printed JSON file below a data
//! directory. Files are written to a temporary sibling first and renamed into
//! place, so readers never observe a half-written entity.

use std::path::{Path, PathBuf};
use shopfloor_core::{
    AssignmentId, DependencyId, EntryFilter, EntryId, OutputObservation, ProductId,
    ScheduleEntry, Step, StepDependency, StepId, TaskWorkerAssignment,
};
use super::{Result, Storage, StorageError};
use tokio::fs;
use tracing::{debug, warn};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the entity directories.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("steps")).await?;
        fs::create_dir_all(root.join("dependencies")).await?;
        fs::create_dir_all(root.join("entries")).await?;
        fs::create_dir_all(root.join("assignments")).await?;
        fs::create_dir_all(root.join("observations")).await?;

        debug!("Opened JSON storage at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn step_path(&self, id: StepId) -> PathBuf {
        self.root.join("steps").join(format!("{}.json", id))
    }
    fn dependency_path(&self, id: DependencyId) -> PathBuf {
        self.root.join("dependencies").join(format!("{}.json", id))
    }
    fn entry_path(&self, id: EntryId) -> PathBuf {
        self.root.join("entries").join(format!("{}.json", id))
    }
    fn assignment_path(&self, id: AssignmentId) -> PathBuf {
        self.root.join("assignments").join(format!("{}.json", id))
    }
    fn observation_dir(&self, assignment_id: AssignmentId) -> PathBuf {
        self.root.join("observations").join(assignment_id.to_string())
    }
    fn observation_path(&self, observation: &OutputObservation) -> PathBuf {
        self.observation_dir(observation.assignment_id)
            .join(format!("{}.json", observation.id))
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_step(&mut self, step: &Step) -> Result<()> {
        write_json(&self.step_path(step.id), step).await
    }

    async fn load_step(&self, id: StepId) -> Result<Option<Step>> {
        read_json(&self.step_path(id)).await
    }

    async fn list_steps(&self, product_id: ProductId) -> Result<Vec<Step>> {
        let all = list_dir(&self.root.join("steps")).await?;
        Ok(all.into_iter()
            .filter(|s: &Step| s.product_id == product_id)
            .collect())
    }

    async fn save_dependency(&mut self, dependency: &StepDependency) -> Result<()> {
        write_json(&self.dependency_path(dependency.id), dependency).await
    }

    async fn load_dependency(&self, id: DependencyId) -> Result<Option<StepDependency>> {
        read_json(&self.dependency_path(id)).await
    }

    async fn list_dependencies(&self, product_id: ProductId) -> Result<Vec<StepDependency>> {
        let mut all: Vec<StepDependency> = list_dir(&self.root.join("dependencies")).await?;
        all.retain(|d| d.product_id == product_id);
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete_dependency(&mut self, id: DependencyId) -> Result<()> {
        remove_existing(&self.dependency_path(id), || format!("dependency {}", id)).await
    }

    async fn save_entry(&mut self, entry: &ScheduleEntry) -> Result<()> {
        write_json(&self.entry_path(entry.id), entry).await
    }

    async fn load_entry(&self, id: EntryId) -> Result<Option<ScheduleEntry>> {
        read_json(&self.entry_path(id)).await
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<ScheduleEntry>> {
        let mut all: Vec<ScheduleEntry> = list_dir(&self.root.join("entries")).await?;
        all.retain(|e| filter.matches(e));
        all.sort_by(|a, b| {
            a.date.cmp(&b.date)
                .then_with(|| a.planned_start.cmp(&b.planned_start))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(all)
    }

    async fn save_assignment(&mut self, assignment: &TaskWorkerAssignment) -> Result<()> {
        write_json(&self.assignment_path(assignment.id), assignment).await
    }

    async fn load_assignment(&self, id: AssignmentId) -> Result<Option<TaskWorkerAssignment>> {
        read_json(&self.assignment_path(id)).await
    }

    async fn list_assignments(&self, entry_id: EntryId) -> Result<Vec<TaskWorkerAssignment>> {
        let mut all: Vec<TaskWorkerAssignment> = list_dir(&self.root.join("assignments")).await?;
        all.retain(|a| a.entry_id == entry_id);
        all.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete_assignment(&mut self, id: AssignmentId) -> Result<()> {
        remove_existing(&self.assignment_path(id), || format!("assignment {}", id)).await
    }

    async fn record_assignment_progress(
        &mut self,
        assignment: &TaskWorkerAssignment,
        observation: &OutputObservation,
    ) -> Result<()> {
        if observation.assignment_id != assignment.id {
            return Err(StorageError::Other(format!(
                "observation {} belongs to assignment {}, not {}",
                observation.id, observation.assignment_id, assignment.id
            )));
        }

        fs::create_dir_all(self.observation_dir(assignment.id)).await?;
        let observation_path = self.observation_path(observation);
        write_json(&observation_path, observation).await?;

        if let Err(e) = write_json(&self.assignment_path(assignment.id), assignment).await {
            warn!("Assignment {} write failed, dropping observation {}", assignment.id, observation.id);
            if let Err(cleanup) = fs::remove_file(&observation_path).await {
                warn!("Could not remove observation {}: {}", observation.id, cleanup);
            }
            return Err(e);
        }

        Ok(())
    }

    async fn list_observations(&self, assignment_id: AssignmentId) -> Result<Vec<OutputObservation>> {
        let dir = self.observation_dir(assignment_id);
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut observations: Vec<OutputObservation> = list_dir(&dir).await?;
        observations.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then_with(|| a.id.cmp(&b.id)));
        Ok(observations)
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_existing(path: &Path, what: impl FnOnce() -> String) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(what())),
        Err(e) => Err(e.into()),
    }
}

/// Read every `.json` file in `dir`. A file that fails to parse fails the
/// whole listing; graph checks must never run on a partial edge set.
async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_json(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};
    use shopfloor_core::{DependencyType, StepCategory, TaskStatus, WorkerId};
    use tempfile::TempDir;

    fn create_test_step(product_id: ProductId, name: &str) -> Step {
        Step {
            id: StepId::new(),
            product_id,
            name: name.to_string(),
            code: None,
            category: StepCategory::Sewing,
            time_per_piece_seconds: 30,
            sequence: 1,
            equipment_code: None,
            required_skill: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn create_test_entry(step: &Step) -> ScheduleEntry {
        ScheduleEntry {
            id: EntryId::new(),
            product_id: step.product_id,
            order_ref: None,
            step_id: step.id,
            date: NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            planned_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            planned_end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            planned_output: 200,
            status: TaskStatus::NotStarted,
            actual_output: 0,
            actual_start: None,
            actual_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_step_operations() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let product = ProductId::new();

        let step = create_test_step(product, "Sew sleeve");
        storage.save_step(&step).await.unwrap();
        storage.save_step(&create_test_step(ProductId::new(), "Other product")).await.unwrap();

        let loaded = storage.load_step(step.id).await.unwrap().unwrap();
        assert_eq!(loaded, step);

        let steps = storage.list_steps(product).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert!(storage.load_step(StepId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_dependency_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let product = ProductId::new();

        let dep = StepDependency {
            id: DependencyId::new(),
            product_id: product,
            from_step: StepId::new(),
            to_step: StepId::new(),
            dep_type: DependencyType::Finish,
            lag_seconds: 0,
            created_at: Utc::now(),
        };
        storage.save_dependency(&dep).await.unwrap();
        assert_eq!(storage.list_dependencies(product).await.unwrap().len(), 1);

        storage.delete_dependency(dep.id).await.unwrap();
        let err = storage.delete_dependency(dep.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_entries_filtered_by_step() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let step = create_test_step(ProductId::new(), "Cut panels");
        let entry = create_test_entry(&step);
        storage.save_entry(&entry).await.unwrap();

        let found = storage.list_entries(&EntryFilter::for_step(step.id)).await.unwrap();
        assert_eq!(found, vec![entry]);
        let none = storage.list_entries(&EntryFilter::for_step(StepId::new())).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_progress_writes_assignment_and_observation() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let entry_id = EntryId::new();
        let t0 = Utc::now();

        let mut assignment = TaskWorkerAssignment::new(entry_id, WorkerId::new("Noe"), t0);
        storage.save_assignment(&assignment).await.unwrap();
        assert!(storage.list_observations(assignment.id).await.unwrap().is_empty());

        assignment.start(t0).unwrap();
        let first = OutputObservation::new(assignment.id, 0, t0);
        storage.record_assignment_progress(&assignment, &first).await.unwrap();

        let t1 = t0 + Duration::seconds(600);
        assignment.record_output(10, t1).unwrap();
        let second = OutputObservation::new(assignment.id, 10, t1);
        storage.record_assignment_progress(&assignment, &second).await.unwrap();

        let loaded = storage.load_assignment(assignment.id).await.unwrap().unwrap();
        assert_eq!(loaded.actual_output, 10);
        let history = storage.list_observations(assignment.id).await.unwrap();
        assert_eq!(history, vec![first, second]);
        assert_eq!(storage.list_assignments(entry_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_rejects_mismatched_observation() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let assignment = TaskWorkerAssignment::new(EntryId::new(), WorkerId::new("Noe"), Utc::now());
        let stray = OutputObservation::new(AssignmentId::new(), 3, Utc::now());

        assert!(storage.record_assignment_progress(&assignment, &stray).await.is_err());
        assert!(storage.load_assignment(assignment.id).await.unwrap().is_none());
        assert!(storage.list_observations(stray.assignment_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_rolls_back_observation_when_assignment_write_fails() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let t0 = Utc::now();
        let mut assignment = TaskWorkerAssignment::new(EntryId::new(), WorkerId::new("Noe"), t0);
        assignment.start(t0).unwrap();

        // A non-empty directory where the assignment file belongs makes the rename fail.
        let blocker = dir.path().join("assignments").join(format!("{}.json", assignment.id));
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        let observation = OutputObservation::new(assignment.id, 0, t0);
        assert!(storage.record_assignment_progress(&assignment, &observation).await.is_err());
        assert!(storage.list_observations(assignment.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_dependency_file_fails_listing() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let product = ProductId::new();
        storage.save_step(&create_test_step(product, "Hem")).await.unwrap();

        std::fs::write(dir.path().join("dependencies").join("broken.json"), "not json").unwrap();
        std::fs::write(dir.path().join("steps").join("broken.json"), "{").unwrap();

        let err = storage.list_dependencies(product).await.unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
        let err = storage.list_steps(product).await.unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
    }

    #[test]
    fn test_storage_not_found_maps_to_domain_not_found() {
        let err: shopfloor_core::Error = StorageError::NotFound("step x".to_string()).into();
        assert_eq!(err, shopfloor_core::Error::NotFound("step x".to_string()));
    }
}
