//! Dependency service - step and edge mutations over a storage backend.
//!
//! Every graph mutation for a product runs its read, cycle check and write
//! under that product's write lock, so two concurrent additions cannot each
//! pass the check and together close a cycle.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use chrono::Utc;
use serde::Serialize;
use shopfloor_core::{
    DependencyId, DependencyRef, DependencySpec, DependencyType, DependencyUpdate, EntryFilter,
    Error, NewStep, ProductId, Result, Step, StepDependency, StepId, StepUpdate,
    StepWithDependencies,
};
use shopfloor_storage::Storage;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::graph::{DependencyGraph, Edge};
use crate::notation::{format_dependency_list, parse_dependency_list, CodedDependency};

/// One layer of a product's layout with full step records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepLayer {
    /// Zero-based layer index
    pub index: usize,
    /// Steps in this layer, ordered by sequence then identifier
    pub steps: Vec<Step>,
}

/// Earliest start of one step when producing a given quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTiming {
    /// The step
    pub step_id: StepId,
    /// Step code, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Offset from the start of the run, in seconds
    pub earliest_start_seconds: u64,
    /// Standard time for the whole quantity
    pub duration_seconds: u64,
}

/// Step and dependency management.
pub struct DependencyService<S: Storage> {
    storage: Arc<Mutex<S>>,
    product_locks: Arc<Mutex<HashMap<ProductId, Arc<Mutex<()>>>>>,
}

impl<S: Storage> Clone for DependencyService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            product_locks: Arc::clone(&self.product_locks),
        }
    }
}

impl<S: Storage> DependencyService<S> {
    /// Create a new dependency service over shared storage.
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self {
            storage,
            product_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn lock_product(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.product_locks.lock().await;
            Arc::clone(locks.entry(product_id).or_default())
        };
        lock.lock_owned().await
    }

    async fn load_step(&self, id: StepId) -> Result<Step> {
        self.storage
            .lock()
            .await
            .load_step(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("step {}", id)))
    }

    // === Steps ===

    /// Create a step.
    pub async fn create_step(&self, spec: NewStep) -> Result<Step> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("step name must not be empty"));
        }
        if spec.time_per_piece_seconds == 0 {
            return Err(Error::validation("time per piece must be greater than zero"));
        }
        let code = spec.code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());

        let _guard = self.lock_product(spec.product_id).await;
        let mut storage = self.storage.lock().await;

        if let Some(code) = &code {
            let clash = storage
                .list_steps(spec.product_id)
                .await?
                .into_iter()
                .any(|s| s.code.as_deref() == Some(code.as_str()));
            if clash {
                return Err(Error::validation(format!(
                    "step code '{}' already exists in product {}",
                    code, spec.product_id
                )));
            }
        }

        let now = Utc::now();
        let step = Step {
            id: StepId::new(),
            product_id: spec.product_id,
            name,
            code,
            category: spec.category,
            time_per_piece_seconds: spec.time_per_piece_seconds,
            sequence: spec.sequence,
            equipment_code: spec.equipment_code,
            required_skill: spec.required_skill,
            created_at: now,
            updated_at: now,
        };
        storage.save_step(&step).await?;

        info!("Created step {} '{}' in product {}", step.id, step.name, step.product_id);
        Ok(step)
    }

    /// Re-sequence or re-categorize a step that no schedule entry uses yet.
    pub async fn update_step(&self, id: StepId, change: StepUpdate) -> Result<Step> {
        let step = self.load_step(id).await?;
        let _guard = self.lock_product(step.product_id).await;
        let mut storage = self.storage.lock().await;

        let mut step = storage
            .load_step(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("step {}", id)))?;

        let referenced = storage.list_entries(&EntryFilter::for_step(id)).await?.len();
        if referenced > 0 {
            return Err(Error::validation(format!(
                "step {} is referenced by {} schedule entr{} and can only be superseded",
                id,
                referenced,
                if referenced == 1 { "y" } else { "ies" }
            )));
        }

        match change {
            StepUpdate::Resequence(sequence) => step.sequence = sequence,
            StepUpdate::Recategorize(category) => step.category = category,
        }
        step.updated_at = Utc::now();
        storage.save_step(&step).await?;

        debug!("Updated step {}: {:?}", id, change);
        Ok(step)
    }

    /// A step with its incoming dependencies.
    pub async fn get_step(&self, id: StepId) -> Result<StepWithDependencies> {
        let step = self.load_step(id).await?;
        let deps = self.storage.lock().await.list_dependencies(step.product_id).await?;
        Ok(with_dependencies(step, &deps))
    }

    /// All steps of a product with embedded dependencies, by sequence.
    pub async fn get_product_steps(&self, product_id: ProductId) -> Result<Vec<StepWithDependencies>> {
        let storage = self.storage.lock().await;
        let mut steps = storage.list_steps(product_id).await?;
        let deps = storage.list_dependencies(product_id).await?;
        steps.sort_by_key(|s| (s.sequence, s.id));
        Ok(steps.into_iter().map(|s| with_dependencies(s, &deps)).collect())
    }

    // === Dependencies ===

    /// Add `from -> to`.
    ///
    /// An existing identical edge (same endpoints and type) is returned
    /// unchanged. Fails with [`Error::Cycle`] if the edge would close a cycle
    /// over either edge type.
    pub async fn add_dependency(
        &self,
        from: StepId,
        to: StepId,
        dep_type: DependencyType,
        lag_seconds: u32,
    ) -> Result<StepDependency> {
        if from == to {
            return Err(Error::validation(format!("step {} cannot depend on itself", from)));
        }
        let from_step = self.load_step(from).await?;
        let to_step = self.load_step(to).await?;
        if from_step.product_id != to_step.product_id {
            return Err(Error::validation(format!(
                "steps {} and {} belong to different products",
                from, to
            )));
        }
        let product_id = from_step.product_id;

        let _guard = self.lock_product(product_id).await;
        let mut storage = self.storage.lock().await;
        let steps = storage.list_steps(product_id).await?;
        let deps = storage.list_dependencies(product_id).await?;

        if let Some(existing) = deps.iter().find(|d| d.same_edge(from, to, dep_type)) {
            debug!("Dependency {} -> {} ({}) already exists", from, to, dep_type);
            return Ok(existing.clone());
        }

        let graph = DependencyGraph::from_parts(&steps, &deps);
        if let Err(e) = graph.check_edge(from, to) {
            if e.is_cycle() {
                warn!("Rejected dependency {} -> {}: {}", from, to, e);
            }
            return Err(e);
        }

        let dependency = StepDependency {
            id: DependencyId::new(),
            product_id,
            from_step: from,
            to_step: to,
            dep_type,
            lag_seconds,
            created_at: Utc::now(),
        };
        storage.save_dependency(&dependency).await?;

        info!("Added {} dependency {} -> {}", dep_type, from, to);
        Ok(dependency)
    }

    /// Remove an edge. Returns the removed edge.
    pub async fn remove_dependency(&self, id: DependencyId) -> Result<StepDependency> {
        let dependency = self
            .storage
            .lock()
            .await
            .load_dependency(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("dependency {}", id)))?;

        let _guard = self.lock_product(dependency.product_id).await;
        self.storage.lock().await.delete_dependency(id).await?;

        info!(
            "Removed {} dependency {} -> {}",
            dependency.dep_type, dependency.from_step, dependency.to_step
        );
        Ok(dependency)
    }

    /// Change the lag or type of an existing edge.
    pub async fn update_dependency(&self, id: DependencyId, change: DependencyUpdate) -> Result<StepDependency> {
        let product_id = self
            .storage
            .lock()
            .await
            .load_dependency(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("dependency {}", id)))?
            .product_id;

        let _guard = self.lock_product(product_id).await;
        let mut storage = self.storage.lock().await;
        let mut dependency = storage
            .load_dependency(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("dependency {}", id)))?;

        match change {
            DependencyUpdate::SetLag(lag) => dependency.lag_seconds = lag,
            DependencyUpdate::SetType(dep_type) if dep_type != dependency.dep_type => {
                // The union graph is unchanged, so no cycle check is needed.
                let duplicate = storage
                    .list_dependencies(product_id)
                    .await?
                    .iter()
                    .any(|d| d.same_edge(dependency.from_step, dependency.to_step, dep_type));
                if duplicate {
                    return Err(Error::validation(format!(
                        "a {} dependency {} -> {} already exists",
                        dep_type, dependency.from_step, dependency.to_step
                    )));
                }
                dependency.dep_type = dep_type;
            }
            DependencyUpdate::SetType(_) => return Ok(dependency),
        }
        storage.save_dependency(&dependency).await?;

        debug!("Updated dependency {}: {:?}", id, change);
        Ok(dependency)
    }

    /// Replace the full set of incoming dependencies of a step.
    ///
    /// The desired set is diffed against the stored one; the whole change is
    /// validated on a scratch graph before anything is written. Duplicate
    /// specs collapse to one edge, the last lag winning.
    pub async fn put_step_dependencies(
        &self,
        step_id: StepId,
        desired: Vec<DependencySpec>,
    ) -> Result<StepWithDependencies> {
        let step = self.load_step(step_id).await?;
        let product_id = step.product_id;

        let _guard = self.lock_product(product_id).await;
        let mut storage = self.storage.lock().await;
        let steps = storage.list_steps(product_id).await?;
        let deps = storage.list_dependencies(product_id).await?;
        let known: HashMap<StepId, &Step> = steps.iter().map(|s| (s.id, s)).collect();

        let mut wanted: BTreeMap<(StepId, DependencyType), u32> = BTreeMap::new();
        for spec in desired {
            if spec.step_id == step_id {
                return Err(Error::validation(format!("step {} cannot depend on itself", step_id)));
            }
            if !known.contains_key(&spec.step_id) {
                return Err(match storage.load_step(spec.step_id).await? {
                    Some(_) => Error::validation(format!(
                        "step {} belongs to a different product",
                        spec.step_id
                    )),
                    None => Error::not_found(format!("step {}", spec.step_id)),
                });
            }
            wanted.insert((spec.step_id, spec.dep_type), spec.lag_seconds);
        }

        let current: Vec<&StepDependency> = deps.iter().filter(|d| d.to_step == step_id).collect();
        let removals: Vec<DependencyId> = current
            .iter()
            .filter(|d| !wanted.contains_key(&(d.from_step, d.dep_type)))
            .map(|d| d.id)
            .collect();
        let lag_changes: Vec<StepDependency> = current
            .iter()
            .filter_map(|d| {
                let lag = *wanted.get(&(d.from_step, d.dep_type))?;
                (lag != d.lag_seconds).then(|| StepDependency { lag_seconds: lag, ..(*d).clone() })
            })
            .collect();
        let additions: Vec<(StepId, DependencyType, u32)> = wanted
            .iter()
            .filter(|((from, dep_type), _)| !current.iter().any(|d| d.same_edge(*from, step_id, *dep_type)))
            .map(|(&(from, dep_type), &lag)| (from, dep_type, lag))
            .collect();

        let kept: Vec<StepDependency> = deps
            .iter()
            .filter(|d| !removals.contains(&d.id))
            .cloned()
            .collect();
        let mut scratch = DependencyGraph::from_parts(&steps, &kept);
        for &(from, dep_type, lag_seconds) in &additions {
            if let Err(e) = scratch.add_edge(Edge { from, to: step_id, dep_type, lag_seconds }) {
                warn!("Rejected dependency set for step {}: {}", step_id, e);
                return Err(e);
            }
        }

        for id in &removals {
            storage.delete_dependency(*id).await?;
        }
        for dep in &lag_changes {
            storage.save_dependency(dep).await?;
        }
        let now = Utc::now();
        for &(from, dep_type, lag_seconds) in &additions {
            storage
                .save_dependency(&StepDependency {
                    id: DependencyId::new(),
                    product_id,
                    from_step: from,
                    to_step: step_id,
                    dep_type,
                    lag_seconds,
                    created_at: now,
                })
                .await?;
        }

        info!(
            "Replaced dependencies of step {}: +{} -{} ~{}",
            step_id,
            additions.len(),
            removals.len(),
            lag_changes.len()
        );
        let deps = storage.list_dependencies(product_id).await?;
        Ok(with_dependencies(step, &deps))
    }

    /// Replace a step's dependencies from `CODE:type` notation, resolving
    /// codes within the step's product.
    pub async fn put_step_dependencies_by_code(
        &self,
        step_id: StepId,
        text: &str,
    ) -> Result<StepWithDependencies> {
        let coded = parse_dependency_list(text)?;
        let step = self.load_step(step_id).await?;
        let steps = self.storage.lock().await.list_steps(step.product_id).await?;

        let mut specs = Vec::with_capacity(coded.len());
        for dep in coded {
            let target = steps
                .iter()
                .find(|s| s.code.as_deref() == Some(dep.code.as_str()))
                .ok_or_else(|| {
                    Error::not_found(format!("step code '{}' in product {}", dep.code, step.product_id))
                })?;
            specs.push(DependencySpec {
                step_id: target.id,
                dep_type: dep.dep_type,
                lag_seconds: 0,
            });
        }
        self.put_step_dependencies(step_id, specs).await
    }

    // === Layout ===

    /// The product's dependency graph as currently stored, with its steps.
    async fn product_graph(&self, product_id: ProductId) -> Result<(DependencyGraph, Vec<Step>)> {
        let storage = self.storage.lock().await;
        let steps = storage.list_steps(product_id).await?;
        let deps = storage.list_dependencies(product_id).await?;
        drop(storage);

        let graph = DependencyGraph::from_parts(&steps, &deps);
        debug!("Loaded graph of product {}: {} steps, {} edges", product_id, graph.len(), graph.edges().len());
        Ok((graph, steps))
    }

    /// Steps partitioned into layers: `finish` predecessors sit on a strictly
    /// lower layer, `start` predecessors on the same or a lower one.
    pub async fn topological_layers(&self, product_id: ProductId) -> Result<Vec<StepLayer>> {
        let (graph, steps) = self.product_graph(product_id).await?;
        let layers = graph.layers()?;
        let mut by_id: HashMap<StepId, Step> = steps.into_iter().map(|s| (s.id, s)).collect();

        Ok(layers
            .into_iter()
            .map(|layer| StepLayer {
                index: layer.index,
                steps: layer.steps.iter().filter_map(|id| by_id.remove(id)).collect(),
            })
            .collect())
    }

    /// Earliest start offsets for producing `quantity` pieces, in
    /// topological order. Each step takes its standard time per piece times
    /// the quantity.
    pub async fn step_timings(&self, product_id: ProductId, quantity: u32) -> Result<Vec<StepTiming>> {
        let (graph, steps) = self.product_graph(product_id).await?;
        if graph.is_empty() {
            return Ok(Vec::new());
        }

        let durations: HashMap<StepId, u64> = steps
            .iter()
            .map(|s| (s.id, u64::from(s.time_per_piece_seconds) * u64::from(quantity)))
            .collect();
        let starts = graph.earliest_starts(&durations)?;
        let codes: HashMap<StepId, Option<String>> =
            steps.into_iter().map(|s| (s.id, s.code)).collect();

        Ok(graph
            .topological_order()?
            .into_iter()
            .map(|id| StepTiming {
                step_id: id,
                code: codes.get(&id).cloned().flatten(),
                earliest_start_seconds: starts.get(&id).copied().unwrap_or(0),
                duration_seconds: durations.get(&id).copied().unwrap_or(0),
            })
            .collect())
    }

    /// A step's incoming edges in `CODE:type` notation. Lag is not part of
    /// the notation.
    pub async fn dependency_notation(&self, step_id: StepId) -> Result<String> {
        let step = self.load_step(step_id).await?;
        let storage = self.storage.lock().await;
        let steps = storage.list_steps(step.product_id).await?;
        let deps = storage.list_dependencies(step.product_id).await?;
        drop(storage);

        let codes: HashMap<StepId, Option<String>> =
            steps.into_iter().map(|s| (s.id, s.code)).collect();
        let mut coded = Vec::new();
        for dep in with_dependencies(step, &deps).dependencies {
            let code = codes
                .get(&dep.step_id)
                .cloned()
                .flatten()
                .ok_or_else(|| Error::validation(format!("predecessor step {} has no code", dep.step_id)))?;
            coded.push(CodedDependency { code, dep_type: dep.dep_type });
        }
        coded.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.dep_type.cmp(&b.dep_type)));
        Ok(format_dependency_list(&coded))
    }
}

fn with_dependencies(step: Step, deps: &[StepDependency]) -> StepWithDependencies {
    let mut dependencies: Vec<DependencyRef> = deps
        .iter()
        .filter(|d| d.to_step == step.id)
        .map(|d| DependencyRef {
            step_id: d.from_step,
            dep_type: d.dep_type,
            lag_seconds: d.lag_seconds,
        })
        .collect();
    dependencies.sort_by_key(|d| (d.step_id, d.dep_type));
    StepWithDependencies { step, dependencies }
}
