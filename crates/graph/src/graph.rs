//! In-memory dependency graph for one product.
//!
//! Cycle detection always runs on the union of `start` and `finish` edges: a
//! co-start edge and a strict-sequence edge can still close a loop together.
//! Layering only lets `finish` edges push a step down a layer, since co-start
//! steps run concurrently with their predecessor.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use serde::Serialize;
use shopfloor_core::{DependencyType, Error, Result, Step, StepDependency, StepId};

/// A typed edge `from -> to` (`to` depends on `from`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Predecessor
    pub from: StepId,
    /// Dependent
    pub to: StepId,
    /// Edge semantics
    pub dep_type: DependencyType,
    /// Delay after the predecessor finishes
    pub lag_seconds: u32,
}

/// One layer of the topological layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layer {
    /// Zero-based layer index
    pub index: usize,
    /// Steps in this layer, ordered by sequence then identifier
    pub steps: Vec<StepId>,
}

/// Dependency graph over the steps of one product.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// step -> sequence number
    nodes: BTreeMap<StepId, u32>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from stored steps and edges.
    ///
    /// Edges are taken as-is; call [`DependencyGraph::find_cycle`] to verify
    /// data that did not go through [`DependencyGraph::add_edge`].
    pub fn from_parts(steps: &[Step], dependencies: &[StepDependency]) -> Self {
        let mut graph = Self::new();
        for step in steps {
            graph.add_node(step.id, step.sequence);
        }
        for dep in dependencies {
            graph.edges.push(Edge {
                from: dep.from_step,
                to: dep.to_step,
                dep_type: dep.dep_type,
                lag_seconds: dep.lag_seconds,
            });
        }
        graph
    }

    /// Add (or re-sequence) a node.
    pub fn add_node(&mut self, id: StepId, sequence: u32) {
        self.nodes.insert(id, sequence);
    }

    /// Whether the graph holds a node.
    pub fn contains(&self, id: StepId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add an edge after validating it.
    ///
    /// Self-loops and unknown endpoints are rejected. An identical edge
    /// (same endpoints and type) is accepted without change. Returns whether
    /// the graph changed.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool> {
        self.check_edge(edge.from, edge.to)?;
        if self.has_edge(edge.from, edge.to, edge.dep_type) {
            return Ok(false);
        }
        self.edges.push(edge);
        Ok(true)
    }

    /// Validate a prospective edge without adding it.
    pub fn check_edge(&self, from: StepId, to: StepId) -> Result<()> {
        if from == to {
            return Err(Error::validation(format!("step {} cannot depend on itself", from)));
        }
        for id in [from, to] {
            if !self.contains(id) {
                return Err(Error::not_found(format!("step {}", id)));
            }
        }
        // from -> to closes a cycle iff `from` is already reachable from `to`.
        if let Some(back) = self.path_between(to, from) {
            let mut path = Vec::with_capacity(back.len() + 1);
            path.push(from);
            path.extend(back);
            return Err(Error::Cycle { path });
        }
        Ok(())
    }

    /// Remove an edge. Returns whether it existed.
    pub fn remove_edge(&mut self, from: StepId, to: StepId, dep_type: DependencyType) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| !(e.from == from && e.to == to && e.dep_type == dep_type));
        self.edges.len() != before
    }

    /// Whether an identical edge exists.
    pub fn has_edge(&self, from: StepId, to: StepId, dep_type: DependencyType) -> bool {
        self.edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.dep_type == dep_type)
    }

    /// Successors over the union graph, deduplicated and sorted.
    fn successors(&self) -> BTreeMap<StepId, BTreeSet<StepId>> {
        let mut succ: BTreeMap<StepId, BTreeSet<StepId>> = BTreeMap::new();
        for e in &self.edges {
            succ.entry(e.from).or_default().insert(e.to);
        }
        succ
    }

    /// A directed path `from -> ... -> to` over both edge types, if any.
    pub fn path_between(&self, from: StepId, to: StepId) -> Option<Vec<StepId>> {
        let succ = self.successors();
        let mut parent: HashMap<StepId, StepId> = HashMap::new();
        let mut visited: HashSet<StepId> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![to];
                let mut cur = to;
                while let Some(&p) = parent.get(&cur) {
                    path.push(p);
                    cur = p;
                }
                path.reverse();
                return Some(path);
            }
            if let Some(next) = succ.get(&node) {
                for &n in next {
                    if visited.insert(n) {
                        parent.insert(n, node);
                        queue.push_back(n);
                    }
                }
            }
        }
        None
    }

    /// Find any cycle in the union graph. The returned path starts and ends
    /// on the same step.
    pub fn find_cycle(&self) -> Option<Vec<StepId>> {
        let succ = self.successors();
        let mut visited: HashSet<StepId> = HashSet::new();
        let mut stack: HashSet<StepId> = HashSet::new();

        for &start in self.nodes.keys() {
            if !visited.contains(&start) {
                let mut path = Vec::new();
                if let Some(cycle) = find_cycle_from(start, &succ, &mut visited, &mut stack, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Steps in a topological order of the union graph. Ties are broken by
    /// sequence, then identifier.
    pub fn topological_order(&self) -> Result<Vec<StepId>> {
        let succ = self.successors();
        let mut indegree: BTreeMap<StepId, usize> = self.nodes.keys().map(|&id| (id, 0)).collect();
        for targets in succ.values() {
            for t in targets {
                if let Some(d) = indegree.get_mut(t) {
                    *d += 1;
                }
            }
        }

        let mut ready: BTreeSet<(u32, StepId)> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(&id, _)| (self.nodes[&id], id))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some((_, id)) = ready.pop_first() {
            order.push(id);
            if let Some(targets) = succ.get(&id) {
                for t in targets {
                    if let Some(d) = indegree.get_mut(t) {
                        *d -= 1;
                        if *d == 0 {
                            ready.insert((self.nodes[t], *t));
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let path = self.find_cycle().unwrap_or_default();
            return Err(Error::Cycle { path });
        }
        Ok(order)
    }

    /// Layer index of every step.
    ///
    /// A step sits one layer below its deepest `finish` predecessor, and at
    /// least on the layer of every `start` predecessor. Roots are layer 0.
    pub fn layer_indices(&self) -> Result<BTreeMap<StepId, usize>> {
        let order = self.topological_order()?;
        let mut incoming: HashMap<StepId, Vec<&Edge>> = HashMap::new();
        for e in &self.edges {
            incoming.entry(e.to).or_default().push(e);
        }

        let mut layer: BTreeMap<StepId, usize> = BTreeMap::new();
        for id in order {
            let mut depth = 0;
            for e in incoming.get(&id).map(|v| v.as_slice()).unwrap_or(&[]) {
                let Some(&pred) = layer.get(&e.from) else { continue };
                depth = depth.max(match e.dep_type {
                    DependencyType::Finish => pred + 1,
                    DependencyType::Start => pred,
                });
            }
            layer.insert(id, depth);
        }
        Ok(layer)
    }

    /// Steps partitioned into ordered layers.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        let indices = self.layer_indices()?;
        let mut grouped: BTreeMap<usize, Vec<StepId>> = BTreeMap::new();
        for (id, idx) in indices {
            grouped.entry(idx).or_default().push(id);
        }

        Ok(grouped
            .into_iter()
            .map(|(index, mut steps)| {
                steps.sort_by_key(|id| (self.nodes[id], *id));
                Layer { index, steps }
            })
            .collect())
    }

    /// Earliest start offset (seconds) of every step given per-step
    /// durations. `finish` edges add the predecessor's duration plus lag;
    /// `start` edges only require the predecessor to have begun. Steps
    /// without a duration take zero time.
    pub fn earliest_starts(&self, durations: &HashMap<StepId, u64>) -> Result<BTreeMap<StepId, u64>> {
        let order = self.topological_order()?;
        let mut incoming: HashMap<StepId, Vec<&Edge>> = HashMap::new();
        for e in &self.edges {
            incoming.entry(e.to).or_default().push(e);
        }

        let mut start: BTreeMap<StepId, u64> = BTreeMap::new();
        for id in order {
            let mut earliest = 0u64;
            for e in incoming.get(&id).map(|v| v.as_slice()).unwrap_or(&[]) {
                let Some(&pred_start) = start.get(&e.from) else { continue };
                let bound = match e.dep_type {
                    DependencyType::Start => pred_start,
                    DependencyType::Finish => {
                        pred_start
                            + durations.get(&e.from).copied().unwrap_or(0)
                            + u64::from(e.lag_seconds)
                    }
                };
                earliest = earliest.max(bound);
            }
            start.insert(id, earliest);
        }
        Ok(start)
    }
}

fn find_cycle_from(
    node: StepId,
    succ: &BTreeMap<StepId, BTreeSet<StepId>>,
    visited: &mut HashSet<StepId>,
    stack: &mut HashSet<StepId>,
    path: &mut Vec<StepId>,
) -> Option<Vec<StepId>> {
    visited.insert(node);
    stack.insert(node);
    path.push(node);

    if let Some(next) = succ.get(&node) {
        for &n in next {
            if !visited.contains(&n) {
                if let Some(cycle) = find_cycle_from(n, succ, visited, stack, path) {
                    return Some(cycle);
                }
            } else if stack.contains(&n) {
                let start = path.iter().position(|id| *id == n).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(n);
                return Some(cycle);
            }
        }
    }

    path.pop();
    stack.remove(&node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn edge(from: StepId, to: StepId, dep_type: DependencyType) -> Edge {
        Edge { from, to, dep_type, lag_seconds: 0 }
    }

    fn graph_with(n: usize) -> (DependencyGraph, Vec<StepId>) {
        let mut graph = DependencyGraph::new();
        let ids: Vec<StepId> = (0..n).map(|_| StepId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            graph.add_node(*id, i as u32);
        }
        (graph, ids)
    }

    #[test]
    fn test_self_loop_rejected() {
        let (mut graph, ids) = graph_with(1);
        let err = graph.add_edge(edge(ids[0], ids[0], DependencyType::Finish)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unknown_step_is_not_found() {
        let (mut graph, ids) = graph_with(1);
        let err = graph.add_edge(edge(ids[0], StepId::new(), DependencyType::Finish)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let (mut graph, ids) = graph_with(2);
        assert!(graph.add_edge(edge(ids[0], ids[1], DependencyType::Finish)).unwrap());
        assert!(!graph.add_edge(edge(ids[0], ids[1], DependencyType::Finish)).unwrap());
        assert_eq!(graph.edges().len(), 1);
        // Same endpoints, other type is a distinct edge.
        assert!(graph.add_edge(edge(ids[0], ids[1], DependencyType::Start)).unwrap());
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_mixed_type_cycle_rejected_with_path() {
        let (mut graph, ids) = graph_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        graph.add_edge(edge(a, b, DependencyType::Start)).unwrap();
        graph.add_edge(edge(b, c, DependencyType::Finish)).unwrap();

        let err = graph.add_edge(edge(c, a, DependencyType::Start)).unwrap_err();
        match err {
            Error::Cycle { path } => assert_eq!(path, vec![c, a, b, c]),
            other => panic!("expected cycle, got {:?}", other),
        }
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_two_node_cycle_across_types() {
        let (mut graph, ids) = graph_with(2);
        graph.add_edge(edge(ids[0], ids[1], DependencyType::Finish)).unwrap();
        let err = graph.add_edge(edge(ids[1], ids[0], DependencyType::Start)).unwrap_err();
        assert!(err.is_cycle());
    }

    #[test]
    fn test_start_edges_do_not_deepen_layers() {
        let (mut graph, ids) = graph_with(4);
        let (cut, print, prep, sew) = (ids[0], ids[1], ids[2], ids[3]);
        graph.add_edge(edge(cut, print, DependencyType::Start)).unwrap();
        graph.add_edge(edge(cut, prep, DependencyType::Finish)).unwrap();
        graph.add_edge(edge(prep, sew, DependencyType::Finish)).unwrap();
        graph.add_edge(edge(print, sew, DependencyType::Finish)).unwrap();

        let layers = graph.layers().unwrap();
        assert_eq!(
            layers,
            vec![
                Layer { index: 0, steps: vec![cut, print] },
                Layer { index: 1, steps: vec![prep] },
                Layer { index: 2, steps: vec![sew] },
            ]
        );
    }

    #[test]
    fn test_layer_ties_broken_by_sequence() {
        let mut graph = DependencyGraph::new();
        let first = StepId::new();
        let second = StepId::new();
        graph.add_node(second, 1);
        graph.add_node(first, 5);
        let layers = graph.layers().unwrap();
        assert_eq!(layers[0].steps, vec![second, first]);
    }

    #[test]
    fn test_from_parts_detects_stored_cycle() {
        let (mut graph, ids) = graph_with(2);
        graph.edges.push(edge(ids[0], ids[1], DependencyType::Finish));
        graph.edges.push(edge(ids[1], ids[0], DependencyType::Finish));
        assert!(graph.find_cycle().is_some());
        assert!(graph.layers().unwrap_err().is_cycle());
    }

    #[test]
    fn test_earliest_starts_respect_lag_and_costart() {
        let (mut graph, ids) = graph_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        graph.add_edge(Edge { from: a, to: b, dep_type: DependencyType::Finish, lag_seconds: 60 }).unwrap();
        graph.add_edge(edge(b, c, DependencyType::Start)).unwrap();

        let durations = HashMap::from([(a, 600u64), (b, 300u64)]);
        let starts = graph.earliest_starts(&durations).unwrap();
        assert_eq!(starts[&a], 0);
        assert_eq!(starts[&b], 660);
        assert_eq!(starts[&c], 660);
    }

    // Random acyclic graphs: edges only point from lower to higher index.
    fn acyclic_edges() -> impl Strategy<Value = (usize, Vec<(usize, usize, bool)>)> {
        (2..12usize).prop_flat_map(|n| {
            let edges = proptest::collection::vec((0..n, 0..n, any::<bool>()), 0..(n * 2));
            (Just(n), edges)
        })
    }

    proptest! {
        #[test]
        fn prop_layers_respect_edge_types((n, raw) in acyclic_edges()) {
            let (mut graph, ids) = graph_with(n);
            for (x, y, finish) in raw {
                if x == y {
                    continue;
                }
                let (from, to) = (x.min(y), x.max(y));
                let dep_type = if finish { DependencyType::Finish } else { DependencyType::Start };
                graph.add_edge(edge(ids[from], ids[to], dep_type)).unwrap();
            }

            let layer = graph.layer_indices().unwrap();
            prop_assert_eq!(layer.len(), n);
            for e in graph.edges() {
                match e.dep_type {
                    DependencyType::Finish => prop_assert!(layer[&e.to] > layer[&e.from]),
                    DependencyType::Start => prop_assert!(layer[&e.to] >= layer[&e.from]),
                }
            }
        }

        #[test]
        fn prop_closing_edge_is_rejected((n, kinds) in (3..10usize).prop_flat_map(|n| {
            (Just(n), proptest::collection::vec(any::<bool>(), n))
        })) {
            // Build a chain 0 -> 1 -> ... -> n-1 with mixed types, then close it.
            let (mut graph, ids) = graph_with(n);
            let ty = |finish: bool| if finish { DependencyType::Finish } else { DependencyType::Start };
            for i in 0..n - 1 {
                graph.add_edge(edge(ids[i], ids[i + 1], ty(kinds[i]))).unwrap();
            }
            let err = graph.add_edge(edge(ids[n - 1], ids[0], ty(kinds[n - 1]))).unwrap_err();
            let is_cycle = matches!(err, Error::Cycle { .. });
            prop_assert!(is_cycle);
            prop_assert_eq!(graph.edges().len(), n - 1);
        }
    }
}
