//! Ownership Scopes
//!
//! A scope owns every node created while it is the current owner: signals,
//! computeds, effects and nested scopes. Disposing the scope disposes all of
//! them, newest first, and then runs the scope's own cleanups.
//!
//! Computeds and effects are owners too. What an effect creates during a run
//! belongs to that run and is disposed before the next one.

use super::context::ReactiveContext;
use super::runtime;
use crate::graph::{Node, NodeId};

/// Handle to an ownership scope created by [`with_root`].
///
/// Scopes are plain ids. A scope lives until it, or the scope that owns
/// it, is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope {
    id: NodeId,
}

impl Scope {
    /// Get the scope's graph node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Run `f` with this scope as the owner of everything it creates.
    ///
    /// Reads inside `f` are not tracked by any enclosing computation.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _context = ReactiveContext::scope(self.id);
        f()
    }

    /// Dispose the scope and everything it owns.
    ///
    /// Idempotent. Cleanups may write to signals; effects they trigger run
    /// once all cleanups have finished.
    pub fn dispose(&self) {
        runtime::dispose(self.id);
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.id)
    }
}

/// Create a scope and run `f` inside it.
///
/// The scope is owned by the current owner, if any, so disposing an outer
/// scope disposes roots created within it.
///
/// # Example
///
/// ```rust
/// use ripple_core::{create_signal, with_root};
///
/// let (scope, signal) = with_root(|scope| (scope, create_signal(1)));
/// scope.dispose();
///
/// assert!(signal.is_disposed());
/// signal.write(2);
/// assert_eq!(signal.peek(), 1);
/// ```
pub fn with_root<R>(f: impl FnOnce(Scope) -> R) -> R {
    let scope = Scope {
        id: runtime::register(Node::scope()),
    };
    scope.run(|| f(scope))
}

/// Register `cleanup` with the current owner.
///
/// It runs when the owner is disposed, or before an owning effect or
/// computed runs again. Outside of any owner the callback is dropped
/// without running, and a warning is logged.
pub fn on_cleanup(cleanup: impl FnOnce() + 'static) {
    runtime::on_cleanup(Box::new(cleanup));
}
