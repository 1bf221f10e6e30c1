//! Update Scheduler
//!
//! The scheduler holds the execution state that surrounds the graph:
//!
//! - the observer stack: which consumer, if any, is recording reads
//! - the owner stack: which scope/effect/computed adopts newly created nodes
//! - the batch depth counter
//! - the pending effect queue and whether a flush is in progress
//!
//! # Queue Ordering
//!
//! The queue is an insertion-ordered set. Effects reached by one write are
//! enqueued in creation order (ascending [`NodeId`]); across writes the
//! queue is first-in first-out. An effect already waiting is not enqueued
//! twice.

use indexmap::IndexSet;

use super::node::NodeId;

/// The update scheduler.
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Consumers currently recording dependencies. `None` frames are
    /// untracked regions.
    observers: Vec<Option<NodeId>>,

    /// Owners that adopt newly created nodes.
    owners: Vec<NodeId>,

    /// Depth of nested `run_batched` calls.
    batch_depth: usize,

    /// Effects waiting to run.
    pending: IndexSet<NodeId>,

    /// Whether a flush loop is currently draining the queue.
    flushing: bool,
}

impl Scheduler {
    /// Create a new idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_observer(&mut self, observer: Option<NodeId>) {
        self.observers.push(observer);
    }

    pub fn pop_observer(&mut self) -> Option<Option<NodeId>> {
        self.observers.pop()
    }

    /// The consumer that should record a read right now, if any.
    pub fn current_observer(&self) -> Option<NodeId> {
        self.observers.last().copied().flatten()
    }

    pub fn push_owner(&mut self, owner: NodeId) {
        self.owners.push(owner);
    }

    pub fn pop_owner(&mut self) -> Option<NodeId> {
        self.owners.pop()
    }

    pub fn current_owner(&self) -> Option<NodeId> {
        self.owners.last().copied()
    }

    pub fn enter_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Leave one batch level.
    pub fn exit_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
    }

    pub fn batch_depth(&self) -> usize {
        self.batch_depth
    }

    /// Queue effects, skipping ones already waiting.
    pub fn enqueue(&mut self, effects: impl IntoIterator<Item = NodeId>) {
        self.pending.extend(effects);
    }

    /// Take the next effect to run.
    pub fn next_pending(&mut self) -> Option<NodeId> {
        self.pending.shift_remove_index(0)
    }

    pub fn dequeue(&mut self, effect: NodeId) {
        self.pending.shift_remove(&effect);
    }

    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending(&self) -> &IndexSet<NodeId> {
        &self.pending
    }

    /// Whether a write at this point should drain the queue itself.
    pub fn should_flush(&self) -> bool {
        self.batch_depth == 0 && !self.flushing && !self.pending.is_empty()
    }

    pub fn set_flushing(&mut self, flushing: bool) {
        self.flushing = flushing;
    }

    /// No frames pushed, no batch open and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.observers.is_empty()
            && self.owners.is_empty()
            && self.batch_depth == 0
            && self.pending.is_empty()
            && !self.flushing
    }
}
