//! Graph Nodes
//!
//! This module defines the node records that live in the dependency graph.
//! A node carries graph bookkeeping only: its edges, dirty state, ownership
//! links and pending cleanups. Values live in the typed handles
//! (`Signal<T>`, `Computed<T>`); consumers are reached through a type-erased
//! [`Runner`].

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::Serialize;

use crate::reactive::Subscriber;

/// A callback registered with `on_cleanup` or returned from an effect body.
pub type Cleanup = Box<dyn FnOnce()>;

/// Unique identifier for a node in the dependency graph.
///
/// Ids are handed out from a process-wide counter and never reused, so
/// creation order equals id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source node (signal). These are the roots of the graph.
    /// They have no dependencies, only dependents.
    Source,

    /// A derived node (computed). These have dependencies and may have
    /// dependents. They cache their computed value.
    Derived,

    /// An effect node. These are leaves of the graph.
    /// They have dependencies but no dependents.
    Effect,

    /// An ownership scope. Scopes have no edges; they only own other nodes.
    Scope,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Source => "signal",
            NodeKind::Derived => "computed",
            NodeKind::Effect => "effect",
            NodeKind::Scope => "scope",
        };
        f.write_str(name)
    }
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// The node might need to recompute. A transitive dependency changed,
    /// but we have not yet verified if its direct inputs are different.
    MaybeDirty,

    /// The node definitely needs to recompute. A direct input changed.
    Dirty,
}

/// How the graph reaches the computation behind a consumer node.
///
/// Effects are kept alive by the graph until disposed; computeds live as
/// long as a handle to them does.
pub(crate) enum Runner {
    Owned(Rc<dyn Subscriber>),
    Borrowed(Weak<dyn Subscriber>),
}

impl Runner {
    pub fn upgrade(&self) -> Option<Rc<dyn Subscriber>> {
        match self {
            Runner::Owned(rc) => Some(Rc::clone(rc)),
            Runner::Borrowed(weak) => weak.upgrade(),
        }
    }
}

/// A node in the dependency graph.
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What kind of node this is.
    kind: NodeKind,

    /// Current dirty state.
    dirty: DirtyState,

    /// Set while the node's body is executing.
    running: bool,

    /// Nodes that this node depends on (parents in the DAG), in the order
    /// they were first read during the last run.
    dependencies: IndexSet<NodeId>,

    /// Nodes that depend on this node (children in the DAG), in
    /// subscription order.
    dependents: IndexSet<NodeId>,

    /// The scope, effect or computed that disposes this node.
    owner: Option<NodeId>,

    /// Nodes created while this node was the active owner.
    owned: IndexSet<NodeId>,

    /// Callbacks to run before the next rerun or on disposal.
    cleanups: Vec<Cleanup>,

    runner: Option<Runner>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            dirty: match kind {
                NodeKind::Source | NodeKind::Scope => DirtyState::Clean,
                NodeKind::Derived => DirtyState::Dirty, // Start dirty to ensure first computation
                NodeKind::Effect => DirtyState::Dirty,
            },
            running: false,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            owner: None,
            owned: IndexSet::new(),
            cleanups: Vec::new(),
            runner: None,
        }
    }

    /// Create a new source (signal) node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new derived (computed) node.
    pub fn derived() -> Self {
        Self::new(NodeKind::Derived)
    }

    /// Create a new effect node.
    pub fn effect() -> Self {
        Self::new(NodeKind::Effect)
    }

    /// Create a new ownership scope node.
    pub fn scope() -> Self {
        Self::new(NodeKind::Scope)
    }

    pub fn with_owner(mut self, owner: Option<NodeId>) -> Self {
        self.owner = owner;
        self
    }

    pub(crate) fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Get the current dirty state.
    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    /// Check if the node needs any processing.
    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark the node as clean.
    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty (a dependency might have changed).
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    /// Mark the node as definitely dirty (needs recomputation).
    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Add a dependency (a node that this node reads from).
    pub fn add_dependency(&mut self, node_id: NodeId) -> bool {
        self.dependencies.insert(node_id)
    }

    /// Remove a dependency.
    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    /// Get all dependencies.
    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, node_id: NodeId) -> bool {
        self.dependents.insert(node_id)
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    /// Get all dependents.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Clear all dependencies, returning the ones that were set.
    pub fn take_dependencies(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependencies)
    }

    pub fn take_dependents(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dependents)
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn owned(&self) -> &IndexSet<NodeId> {
        &self.owned
    }

    pub fn adopt(&mut self, child: NodeId) {
        self.owned.insert(child);
    }

    pub fn release(&mut self, child: NodeId) {
        self.owned.shift_remove(&child);
    }

    pub fn take_owned(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.owned)
    }

    pub fn push_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    /// Take the pending cleanups in the order they should run (last
    /// registered first).
    pub fn take_cleanups(&mut self) -> impl Iterator<Item = Cleanup> {
        std::mem::take(&mut self.cleanups).into_iter().rev()
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.len()
    }

    pub(crate) fn runner(&self) -> Option<&Runner> {
        self.runner.as_ref()
    }

    pub(crate) fn take_runner(&mut self) -> Option<Runner> {
        self.runner.take()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dirty", &self.dirty)
            .field("running", &self.running)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("owner", &self.owner)
            .field("owned", &self.owned)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}
