//! Graph Snapshots
//!
//! A read-only, serializable picture of the dependency graph. Devtools
//! panels consume these to draw the live graph; tests use them to check the
//! edge invariants.

use serde::Serialize;

use super::arena::Graph;
use super::node::{DirtyState, Node, NodeId, NodeKind};
use super::scheduler::Scheduler;
use crate::error::SnapshotError;

/// One node as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    pub state: DirtyState,
    pub dependencies: Vec<NodeId>,
    pub subscribers: Vec<NodeId>,
    pub owner: Option<NodeId>,
    pub owned: Vec<NodeId>,
    pub cleanups: usize,
}

impl From<&Node> for NodeSnapshot {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            kind: node.kind(),
            state: node.dirty_state(),
            dependencies: node.dependencies().iter().copied().collect(),
            subscribers: node.dependents().iter().copied().collect(),
            owner: node.owner(),
            owned: node.owned().iter().copied().collect(),
            cleanups: node.cleanup_count(),
        }
    }
}

/// The whole graph plus scheduler state, nodes sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub pending: Vec<NodeId>,
    pub batch_depth: usize,
}

impl GraphSnapshot {
    pub(crate) fn capture(graph: &Graph, scheduler: &Scheduler) -> Self {
        let mut nodes: Vec<NodeSnapshot> = graph.nodes().map(NodeSnapshot::from).collect();
        nodes.sort_by_key(|node| node.id);
        Self {
            nodes,
            pending: scheduler.pending().iter().copied().collect(),
            batch_depth: scheduler.batch_depth(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes
            .binary_search_by_key(&id, |node| node.id)
            .ok()
            .map(|index| &self.nodes[index])
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|node| node.kind == kind).count()
    }

    /// Check that every edge is recorded on both of its ends and only points
    /// at live nodes.
    pub fn is_consistent(&self) -> bool {
        self.nodes.iter().all(|node| {
            node.dependencies.iter().all(|dep| {
                self.node(*dep)
                    .is_some_and(|producer| producer.subscribers.contains(&node.id))
            }) && node.subscribers.iter().all(|sub| {
                self.node(*sub)
                    .is_some_and(|consumer| consumer.dependencies.contains(&node.id))
            })
        })
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// MessagePack encoding with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}
