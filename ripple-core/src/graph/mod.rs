//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive values and computations.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (signals) or computations (computeds,
//!   effects), plus ownership scopes that have no edges at all
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a signal changes, we walk the graph to find all affected nodes and
//! mark them dirty. Computeds then recompute lazily when read; effects are
//! handed to the [`Scheduler`].
//!
//! # Design Decisions
//!
//! 1. We use a centralized arena rather than per-handle subscriber lists:
//!    - It keeps both edge directions consistent in one place
//!    - It lets disposal walk ownership trees without touching typed values
//!    - It makes snapshots of the whole graph trivial
//!
//! 2. The arena is indexed by node ID for O(1) lookups.
//!
//! 3. Edge sets are insertion ordered, so traversal order is deterministic.

mod arena;
mod node;
mod scheduler;
mod snapshot;

pub use arena::{Graph, Teardown, Touched};
pub(crate) use node::Runner;
pub use node::{Cleanup, DirtyState, Node, NodeId, NodeKind};
pub use scheduler::Scheduler;
pub use snapshot::{GraphSnapshot, NodeSnapshot};
