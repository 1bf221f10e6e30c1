//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! The scheduler keeps an observer stack and an owner stack. Entering a
//! context pushes frames onto them; the returned guard pops them again when
//! dropped, including while unwinding from a panic. This keeps the stacks
//! balanced no matter how a body exits.
//!
//! Three kinds of frame exist:
//!
//! - consumer frames: a computed or effect body, which both records reads
//!   and owns what it creates
//! - scope frames: a root body, which owns what it creates but records
//!   nothing
//! - untracked frames: hide the enclosing observer

use super::runtime::{try_with_runtime, with_runtime};
use crate::graph::NodeId;

/// Guard that pops the context when dropped.
///
/// This ensures the context stacks are properly maintained even if
/// the computation panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    observer: Option<NodeId>,
    owner: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a consumer's context.
    ///
    /// While this context is active, reads register the consumer as a
    /// dependent, new nodes are owned by it, and the consumer is flagged as
    /// running so re-entry is reported as a cycle.
    pub(crate) fn enter(consumer: NodeId) -> Self {
        with_runtime(|rt| {
            rt.scheduler_mut().push_observer(Some(consumer));
            rt.scheduler_mut().push_owner(consumer);
            if let Some(node) = rt.graph_mut().get_node_mut(consumer) {
                node.set_running(true);
            }
        });

        Self {
            observer: Some(consumer),
            owner: Some(consumer),
        }
    }

    /// Enter a scope's context: owned, but untracked.
    pub(crate) fn scope(scope: NodeId) -> Self {
        with_runtime(|rt| {
            rt.scheduler_mut().push_observer(None);
            rt.scheduler_mut().push_owner(scope);
        });

        Self {
            observer: None,
            owner: Some(scope),
        }
    }

    /// Enter an untracked region. The current owner stays in place.
    pub(crate) fn untracked() -> Self {
        with_runtime(|rt| rt.scheduler_mut().push_observer(None));

        Self {
            observer: None,
            owner: None,
        }
    }

    /// Check if there is an active tracking context.
    pub fn is_active() -> bool {
        Self::current_observer().is_some()
    }

    /// Get the consumer currently recording reads, if any.
    pub fn current_observer() -> Option<NodeId> {
        with_runtime(|rt| rt.scheduler().current_observer())
    }

    /// Get the node that adopts newly created nodes, if any.
    pub fn current_owner() -> Option<NodeId> {
        with_runtime(|rt| rt.scheduler().current_owner())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let unwinding = std::thread::panicking();

        try_with_runtime(|rt| {
            let popped = rt.scheduler_mut().pop_observer();

            // Verify we're popping the right context.
            // This helps catch bugs where contexts are mismatched.
            if !unwinding {
                debug_assert_eq!(
                    popped,
                    Some(self.observer),
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer,
                    popped
                );
            }

            if self.owner.is_some() {
                rt.scheduler_mut().pop_owner();
            }

            if let Some(consumer) = self.observer {
                if let Some(node) = rt.graph_mut().get_node_mut(consumer) {
                    node.set_running(false);
                    // A body that panicked produced nothing usable.
                    if unwinding {
                        node.mark_dirty();
                    }
                }
            }
        });
    }
}

/// Run `f` without recording any reads, returning its result.
///
/// Reads inside `f` register no dependencies, whatever the surrounding
/// context. Nodes created inside `f` are still owned by the current owner.
pub fn run_untracked<R>(f: impl FnOnce() -> R) -> R {
    let _context = ReactiveContext::untracked();
    f()
}
