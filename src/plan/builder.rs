// src/plan/builder.rs

//! Assembly of the execution plan from resolved task batches.
//!
//! The builder is single-threaded by design: all graph construction,
//! including the access-hierarchy tries, happens here before parallel
//! execution begins.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::cross_build::{PeerTaskIdentifier, PeerTaskState};
use crate::errors::{Result, TaskplanError};
use crate::plan::hierarchy::{ExecutionNodeAccessHierarchies, ExecutionNodeAccessHierarchy};
use crate::plan::node::{CrossBuildPayload, Node, NodeId, NodeKind, TaskPayload};
use crate::plan::ordinal::{OrdinalGroup, OrdinalGroupFactory};
use crate::plan::ordinal_access::OrdinalNodeAccess;
use crate::plan::plan::ExecutionPlan;
use crate::types::CaseSensitivity;

/// Resolved description of a task, as handed over by the (external)
/// configuration layer.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub path: String,
    pub command: Option<String>,
    pub dependencies: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub destroys: Vec<PathBuf>,
    pub locks: Vec<String>,
    pub project: Option<String>,
}

impl TaskSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            command: None,
            dependencies: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            destroys: Vec::new(),
            locks: Vec::new(),
            project: None,
        }
    }

    pub fn command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn after(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn destroys(mut self, path: impl Into<PathBuf>) -> Self {
        self.destroys.push(path.into());
        self
    }

    pub fn lock(mut self, name: impl Into<String>) -> Self {
        self.locks.push(name.into());
        self
    }

    pub fn project(mut self, name: impl Into<String>) -> Self {
        self.project = Some(name.into());
        self
    }
}

/// Description of a task deferred to a peer build's graph.
#[derive(Debug, Clone)]
pub struct CrossBuildSpec {
    pub build: String,
    pub task_path: String,
    pub dependencies: Vec<String>,
}

/// One entry of a batch: either local work or a peer-build reference.
#[derive(Debug, Clone)]
pub enum NodeSpec {
    Task(TaskSpec),
    CrossBuild(CrossBuildSpec),
}

impl From<TaskSpec> for NodeSpec {
    fn from(spec: TaskSpec) -> Self {
        NodeSpec::Task(spec)
    }
}

impl From<CrossBuildSpec> for NodeSpec {
    fn from(spec: CrossBuildSpec) -> Self {
        NodeSpec::CrossBuild(spec)
    }
}

/// Builds an [`ExecutionPlan`] from successive entry batches.
///
/// Each call to [`PlanBuilder::add_entry_batch`] assigns the next ordinal.
/// Finalization wires the cross-ordinal anchor chain and validates the
/// combined graph is acyclic.
#[derive(Debug)]
pub struct PlanBuilder {
    case_sensitivity: CaseSensitivity,
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    groups: OrdinalGroupFactory,
    anchors: OrdinalNodeAccess,
    hierarchies: ExecutionNodeAccessHierarchies,
    /// One input hierarchy per project, created through the factory method.
    input_hierarchies: HashMap<String, ExecutionNodeAccessHierarchy>,
    next_ordinal: usize,
}

impl PlanBuilder {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            case_sensitivity,
            nodes: Vec::new(),
            by_name: HashMap::new(),
            groups: OrdinalGroupFactory::new(),
            anchors: OrdinalNodeAccess::new(),
            hierarchies: ExecutionNodeAccessHierarchies::new(case_sensitivity),
            input_hierarchies: HashMap::new(),
            next_ordinal: 0,
        }
    }

    /// Ordinal groups seen so far, for diagnostics.
    pub fn groups(&self) -> impl Iterator<Item = &OrdinalGroup> {
        self.groups.all_groups()
    }

    /// Add the next user-requested batch of entry nodes.
    ///
    /// Dependencies may reference tasks in the same batch or any earlier
    /// one. Returns the ordinal assigned to the batch.
    pub fn add_entry_batch(&mut self, specs: Vec<NodeSpec>) -> Result<usize> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.groups.group(ordinal);

        debug!(ordinal, entries = specs.len(), "adding entry batch");

        // First pass: create the nodes so same-batch references resolve.
        let mut created = Vec::with_capacity(specs.len());
        for spec in &specs {
            let (name, kind) = match spec {
                NodeSpec::Task(task) => (
                    task.path.clone(),
                    NodeKind::Task(TaskPayload {
                        path: task.path.clone(),
                        command: task.command.clone(),
                        ordinal,
                        inputs: task.inputs.clone(),
                        outputs: task.outputs.clone(),
                        destroys: task.destroys.clone(),
                        locks: task.locks.clone(),
                        project: task.project.clone(),
                    }),
                ),
                NodeSpec::CrossBuild(peer) => {
                    let identifier = PeerTaskIdentifier {
                        build: peer.build.clone(),
                        task_path: peer.task_path.clone(),
                    };
                    (
                        identifier.to_string(),
                        NodeKind::CrossBuildTask(CrossBuildPayload {
                            identifier,
                            ordinal,
                            peer_state: PeerTaskState::Waiting,
                        }),
                    )
                }
            };

            if self.by_name.contains_key(&name) {
                return Err(TaskplanError::ConfigError(format!(
                    "duplicate task '{name}' in execution plan"
                )));
            }
            let id = NodeId(self.nodes.len());
            self.nodes.push(Node::new(id, kind));
            self.by_name.insert(name, id);
            created.push(id);
        }

        // Second pass: explicit dependency edges.
        for (spec, &id) in specs.iter().zip(&created) {
            let (name, deps) = match spec {
                NodeSpec::Task(task) => (&task.path, &task.dependencies),
                NodeSpec::CrossBuild(peer) => (&peer.task_path, &peer.dependencies),
            };
            for dep in deps {
                let dep_id = self.by_name.get(dep).copied().ok_or_else(|| {
                    TaskplanError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                self.nodes[id.index()].add_dependency(dep_id);
            }
        }

        // Third pass: access recording, anchor membership, overlap edges.
        for (spec, &id) in specs.iter().zip(&created) {
            if let NodeSpec::Task(task) = spec {
                self.wire_accesses(id, task, ordinal);
            }
        }

        Ok(ordinal)
    }

    /// Finalize the plan: chain ordinal anchors, check acyclicity, and fill
    /// in the inverse edges.
    pub fn finish(mut self) -> Result<ExecutionPlan> {
        self.anchors.create_inter_node_relationships(&mut self.nodes);
        self.check_acyclic()?;

        for index in 0..self.nodes.len() {
            for dep in self.nodes[index].dependencies().to_vec() {
                self.nodes[dep.index()].add_dependent(NodeId(index));
            }
        }

        debug!(
            nodes = self.nodes.len(),
            ordinals = self.groups.len(),
            "execution plan assembled"
        );
        Ok(ExecutionPlan::new(self.nodes))
    }

    /// Clear all builder state so a fresh plan can be assembled (used
    /// between incremental invocations).
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.by_name.clear();
        self.anchors.reset(&mut self.groups);
        self.hierarchies = ExecutionNodeAccessHierarchies::new(self.case_sensitivity);
        self.input_hierarchies.clear();
        self.next_ordinal = 0;
    }

    /// Record the task's declared accesses and derive the implicit ordering
    /// edges: anchor membership, preceding-anchor waits, and path-overlap
    /// conflicts found through the hierarchies.
    fn wire_accesses(&mut self, id: NodeId, task: &TaskSpec, ordinal: usize) {
        if !task.outputs.is_empty() {
            self.groups.group(ordinal).record_producer_member();

            let producer_anchor = self.anchors.producer_location_node(ordinal, &mut self.nodes);
            self.nodes[producer_anchor.index()].add_dependency(id);
            if let Some(preceding) = self
                .anchors
                .preceding_destroyer_location_node(ordinal, &mut self.nodes)
            {
                self.nodes[id.index()].add_dependency(preceding);
            }

            for path in &task.outputs {
                let conflicting = self.hierarchies.destroyables().overlapping(path);
                for destroyer in conflicting {
                    self.order_conflict(destroyer, id);
                }
                self.hierarchies.outputs_mut().record_access(id, path);
            }
        }

        if !task.destroys.is_empty() {
            self.groups.group(ordinal).record_destroyer_member();

            let destroyer_anchor = self.anchors.destroyer_location_node(ordinal, &mut self.nodes);
            self.nodes[destroyer_anchor.index()].add_dependency(id);
            if let Some(preceding) = self
                .anchors
                .preceding_producer_location_node(ordinal, &mut self.nodes)
            {
                self.nodes[id.index()].add_dependency(preceding);
            }

            for path in &task.destroys {
                let mut conflicting: Vec<NodeId> =
                    self.hierarchies.outputs().overlapping(path).into_iter().collect();
                // A destroyer must also be ordered against anything that
                // consumes what it deletes.
                for hierarchy in self.input_hierarchies.values() {
                    conflicting.extend(hierarchy.overlapping(path));
                }
                for other in conflicting {
                    self.order_conflict(other, id);
                }
                self.hierarchies.destroyables_mut().record_access(id, path);
            }
        }

        if !task.inputs.is_empty() {
            // A consumer added after a conflicting destroyer is ordered
            // against it the same way.
            let mut conflicting = Vec::new();
            for path in &task.inputs {
                conflicting.extend(self.hierarchies.destroyables().overlapping(path));
            }
            for destroyer in conflicting {
                self.order_conflict(destroyer, id);
            }

            let project = task.project.clone().unwrap_or_default();
            let hierarchy = match self.input_hierarchies.entry(project) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(self.hierarchies.create_input_hierarchy())
                }
            };
            for path in &task.inputs {
                hierarchy.record_access(id, path);
            }
        }
    }

    /// Turn a detected path conflict between `earlier` (already recorded)
    /// and `later` (being added) into an explicit edge.
    ///
    /// The lower ordinal always runs first; for equal ordinals the node
    /// recorded later waits for the earlier one, matching batch discovery
    /// order.
    fn order_conflict(&mut self, earlier: NodeId, later: NodeId) {
        if earlier == later {
            return;
        }
        let earlier_ordinal = self.nodes[earlier.index()].ordinal();
        let later_ordinal = self.nodes[later.index()].ordinal();

        if earlier_ordinal <= later_ordinal {
            debug!(
                waits = %self.nodes[later.index()].display_name(),
                on = %self.nodes[earlier.index()].display_name(),
                "path overlap: adding ordering edge"
            );
            self.nodes[later.index()].add_dependency(earlier);
        } else {
            debug!(
                waits = %self.nodes[earlier.index()].display_name(),
                on = %self.nodes[later.index()].display_name(),
                "path overlap: adding ordering edge"
            );
            self.nodes[earlier.index()].add_dependency(later);
        }
    }

    fn check_acyclic(&self) -> Result<()> {
        // Edge direction: dependency -> dependent, so a toposort failure
        // names a node on the cycle.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..self.nodes.len() {
            graph.add_node(index);
        }
        for node in &self.nodes {
            for dep in node.dependencies() {
                graph.add_edge(dep.index(), node.id().index(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let name = self.nodes[cycle.node_id()].display_name();
                Err(TaskplanError::PlanCycle(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::node::NodeState;
    use crate::engine::WorkOutcome;

    fn builder() -> PlanBuilder {
        PlanBuilder::new(CaseSensitivity::Sensitive)
    }

    #[test]
    fn overlap_between_producer_and_later_destroyer_adds_edge() {
        let mut b = builder();
        b.add_entry_batch(vec![TaskSpec::new(":producer").output("/p/x").into()])
            .unwrap();
        b.add_entry_batch(vec![TaskSpec::new(":destroyer").destroys("/p/x/y").into()])
            .unwrap();
        let plan = b.finish().unwrap();

        let producer = plan.find_task(":producer").unwrap();
        let destroyer = plan.find_task(":destroyer").unwrap();
        assert!(plan.node(destroyer).dependencies().contains(&producer));
    }

    #[test]
    fn overlap_with_lower_ordinal_destroyer_orders_destroyer_first() {
        let mut b = builder();
        b.add_entry_batch(vec![TaskSpec::new(":clean").destroys("build").into()])
            .unwrap();
        b.add_entry_batch(vec![TaskSpec::new(":compile").output("build/classes").into()])
            .unwrap();
        let plan = b.finish().unwrap();

        let clean = plan.find_task(":clean").unwrap();
        let compile = plan.find_task(":compile").unwrap();
        assert!(plan.node(compile).dependencies().contains(&clean));
    }

    #[test]
    fn destroyer_waits_for_consumers_of_overlapping_inputs() {
        let mut b = builder();
        b.add_entry_batch(vec![
            TaskSpec::new(":test").input("build/classes").into(),
            TaskSpec::new(":clean").destroys("build").into(),
        ])
        .unwrap();
        let plan = b.finish().unwrap();

        let test = plan.find_task(":test").unwrap();
        let clean = plan.find_task(":clean").unwrap();
        assert!(plan.node(clean).dependencies().contains(&test));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut b = builder();
        let err = b
            .add_entry_batch(vec![TaskSpec::new(":a").after(":missing").into()])
            .unwrap_err();
        assert!(matches!(err, TaskplanError::UnknownDependency { .. }));
    }

    #[test]
    fn dependency_cycle_is_rejected_at_finish() {
        let mut b = builder();
        b.add_entry_batch(vec![
            TaskSpec::new(":a").after(":b").into(),
            TaskSpec::new(":b").after(":a").into(),
        ])
        .unwrap();
        assert!(matches!(b.finish(), Err(TaskplanError::PlanCycle(_))));
    }

    #[test]
    fn clean_then_build_across_batches_is_serialized_via_anchors() {
        // `clean` (destroys build/) requested first, `build` (outputs to
        // build/) requested second, no explicit dependency between them.
        let mut b = builder();
        b.add_entry_batch(vec![TaskSpec::new(":clean")
            .destroys("build")
            .into()])
            .unwrap();
        b.add_entry_batch(vec![TaskSpec::new(":build")
            .output("build")
            .into()])
            .unwrap();
        let mut plan = b.finish().unwrap();

        let ready = plan.collect_ready();
        assert_eq!(ready.work.len(), 1);
        assert_eq!(ready.work[0].path, ":clean");
        let clean = ready.work[0].node;
        plan.node_started(clean);

        assert!(plan.collect_ready().is_empty());

        plan.node_finished(clean, WorkOutcome::Success);
        let ready = plan.collect_ready();
        assert_eq!(ready.work.len(), 1);
        assert_eq!(ready.work[0].path, ":build");
        let build = ready.work[0].node;
        plan.node_started(build);
        plan.node_finished(build, WorkOutcome::Success);

        assert!(plan.is_finished());
        assert!(plan.nodes().all(|n| n.state() != NodeState::Waiting));
    }

    #[test]
    fn builder_reset_allows_reassembly_from_ordinal_zero() {
        let mut b = builder();
        b.add_entry_batch(vec![TaskSpec::new(":a").into()]).unwrap();
        b.reset();
        let ordinal = b
            .add_entry_batch(vec![TaskSpec::new(":a").into()])
            .unwrap();
        assert_eq!(ordinal, 0);
    }
}
