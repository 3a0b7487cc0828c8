// src/plan/mod.rs

//! Execution-plan representation and assembly.
//!
//! - [`node`] defines the schedulable unit and its state machine.
//! - [`ordinal`] tracks one group per user-requested entry batch.
//! - [`ordinal_access`] creates and caches the synthetic anchor nodes.
//! - [`hierarchy`] indexes which nodes touch which filesystem locations.
//! - [`builder`] assembles the graph from resolved task batches.
//! - [`plan`] owns the finalized graph and the ready-node sweep.

pub mod builder;
pub mod hierarchy;
pub mod node;
pub mod ordinal;
pub mod ordinal_access;
pub mod plan;

pub use builder::{CrossBuildSpec, NodeSpec, PlanBuilder, TaskSpec};
pub use hierarchy::{ExecutionNodeAccessHierarchies, ExecutionNodeAccessHierarchy};
pub use node::{AnchorKind, Node, NodeId, NodeKind, NodeState, ScheduledWork};
pub use ordinal::{OrdinalGroup, OrdinalGroupFactory};
pub use ordinal_access::OrdinalNodeAccess;
pub use plan::{ExecutionPlan, PlanFailure, PlanOutcome, ReadyNodes};
