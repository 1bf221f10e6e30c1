//! Node Arena
//!
//! The arena owns every live node and keeps the producer/consumer edge sets
//! consistent in both directions. All edge mutation goes through here.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;

use super::node::{Cleanup, DirtyState, Node, NodeId, NodeKind, Runner};

/// Nodes touched by a single propagation pass.
pub type Touched = SmallVec<[NodeId; 8]>;

/// Everything a disposal or rerun pulled out of the graph.
///
/// The graph never runs user code, so cleanups are handed back to the caller
/// and runners are dropped by the caller once it no longer holds the runtime.
#[derive(Default)]
pub struct Teardown {
    pub cleanups: Vec<Cleanup>,
    pub runners: Vec<Runner>,
    pub disposed: Touched,
}

impl Teardown {
    pub fn is_empty(&self) -> bool {
        self.cleanups.is_empty() && self.runners.is_empty() && self.disposed.is_empty()
    }
}

/// The dependency graph.
pub struct Graph {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<NodeId, Node>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Add a node to the graph, registering it with its owner.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        if let Some(owner) = node.owner().and_then(|owner| self.nodes.get_mut(&owner)) {
            owner.adopt(id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Remove a single node from the graph.
    ///
    /// Also removes all edges involving this node and detaches it from its
    /// owner. Nodes it owns are left alone; use [`Graph::dispose`] for that.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let mut node = self.nodes.remove(&node_id)?;

        // Remove this node from its dependencies' dependent lists
        for dep_id in node.take_dependencies() {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        // Remove this node from its dependents' dependency lists
        for dependent_id in node.take_dependents() {
            if let Some(dependent) = self.nodes.get_mut(&dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        if let Some(owner) = node.owner().and_then(|owner| self.nodes.get_mut(&owner)) {
            owner.release(node_id);
        }

        Some(node)
    }

    /// Dispose a node and everything it owns.
    ///
    /// Owned nodes go first, newest first, then the node's own cleanups.
    pub fn dispose(&mut self, node_id: NodeId, teardown: &mut Teardown) {
        let Some(mut node) = self.remove_node(node_id) else {
            return;
        };

        for child in node.take_owned().into_iter().rev() {
            self.dispose(child, teardown);
        }

        teardown.cleanups.extend(node.take_cleanups());
        if let Some(runner) = node.take_runner() {
            teardown.runners.push(runner);
        }
        teardown.disposed.push(node_id);
    }

    /// Prepare a consumer for another run.
    ///
    /// Tears down its dependency edges, disposes what it created last time
    /// and hands back its pending cleanups. The node is marked clean so a
    /// write that lands while it is running shows up as a fresh dirty mark.
    pub fn reset_for_rerun(&mut self, node_id: NodeId, teardown: &mut Teardown) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let dependencies = node.take_dependencies();
        let owned = node.take_owned();
        let cleanups: Vec<Cleanup> = node.take_cleanups().collect();
        node.mark_clean();

        for dep_id in dependencies {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for child in owned.into_iter().rev() {
            self.dispose(child, teardown);
        }

        teardown.cleanups.extend(cleanups);
    }

    /// Get a reference to a node.
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable reference to a node.
    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Add a dependency edge: `dependent` depends on `dependency`.
    ///
    /// This means when `dependency` changes, `dependent` may need to update.
    /// Returns `false` if the edge already existed, either end is gone, or
    /// the edge would be a self-loop.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if dependency == dependent
            || !self.nodes.contains_key(&dependency)
            || !self.nodes.contains_key(&dependent)
        {
            return false;
        }
        let added = self
            .nodes
            .get_mut(&dependent)
            .map(|node| node.add_dependency(dependency))
            .unwrap_or(false);
        if added {
            if let Some(dep_node) = self.nodes.get_mut(&dependency) {
                dep_node.add_dependent(dependent);
            }
        }
        added
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Direct dependents become dirty; everything downstream of them becomes
    /// maybe dirty. Returns every node whose state was raised, plus all
    /// direct dependents, in discovery order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Touched {
        let direct: Touched = match self.nodes.get(&source_id) {
            Some(source) => source.dependents().iter().copied().collect(),
            None => return Touched::new(),
        };
        self.mark_dirty(&direct)
    }

    /// Mark the given consumers dirty and everything downstream maybe dirty.
    ///
    /// Already-stale nodes are walked too: a consumer whose run failed is
    /// left stale without a place in the queue, and must still be reached.
    pub fn mark_dirty(&mut self, direct: &[NodeId]) -> Touched {
        let mut touched = Touched::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        for &node_id in direct {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.mark_dirty();
                if seen.insert(node_id) {
                    touched.push(node_id);
                    queue.extend(node.dependents().iter().copied());
                }
            }
        }

        // BFS to propagate maybe-dirty status, visiting each node once.
        while let Some(node_id) = queue.pop_front() {
            if !seen.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.mark_maybe_dirty();
                touched.push(node_id);
                queue.extend(node.dependents().iter().copied());
            }
        }

        touched
    }

    pub fn kind_of(&self, node_id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node_id).map(Node::kind)
    }

    pub fn state_of(&self, node_id: NodeId) -> Option<DirtyState> {
        self.nodes.get(&node_id).map(Node::dirty_state)
    }

    /// Iterate over all nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
