//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-run when the
//!    current write (or the outermost batch) completes.
//!
//! 3. Before re-running, the effect clears its old dependencies, disposes
//!    what its previous run created, runs its cleanups, and tracks new
//!    dependencies during execution.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Updating the DOM when state changes
//! - Logging state changes
//! - Making network requests
//! - Writing to files
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Effects can optionally return a cleanup function. This function is called
//! before the effect re-runs and when the effect is disposed. This is useful
//! for cleaning up resources like event listeners or timers.
//!
//! # Lifetime
//!
//! The runtime keeps an effect alive until it is disposed, either directly
//! or through its owner. Dropping every handle does not stop it.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::batch::run_batched;
use super::runtime;
use super::subscriber::Subscriber;
use crate::graph::{Cleanup, Node, NodeId, Runner};

type Body = Box<dyn FnMut() -> Option<Cleanup>>;

struct EffectInner {
    /// Graph node for this effect.
    id: NodeId,

    /// The effect function.
    body: RefCell<Body>,

    /// Number of times the effect has run.
    runs: Cell<usize>,
}

impl Subscriber for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn run(&self) -> bool {
        self.runs.set(self.runs.get() + 1);
        let cleanup = (*self.body.borrow_mut())();
        if let Some(cleanup) = cleanup {
            runtime::add_cleanup(self.id, cleanup);
        }
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let effect = {
///     let count = count.clone();
///     let seen = seen.clone();
///     Effect::new(move || seen.set(count.read()))
/// };
/// assert_eq!(seen.get(), 0);
///
/// count.write(5);
/// assert_eq!(seen.get(), 5);
///
/// effect.dispose();
/// count.write(6);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the first run, including the cycle error
    /// raised when the body writes a signal it has already read. The effect
    /// is disposed before the panic continues.
    pub fn new<F>(mut body: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self::create(Box::new(move || {
            body();
            None
        }))
    }

    /// Create an effect whose body returns a cleanup for that run.
    ///
    /// The cleanup runs before the next run and on disposal.
    pub fn with_cleanup<F, C>(mut body: F) -> Self
    where
        F: FnMut() -> C + 'static,
        C: FnOnce() + 'static,
    {
        Self::create(Box::new(move || Some(Box::new(body()) as Cleanup)))
    }

    fn create(body: Body) -> Self {
        let node = Node::effect();
        let id = node.id();

        let inner = Rc::new(EffectInner {
            id,
            body: RefCell::new(body),
            runs: Cell::new(0),
        });
        let runner = Rc::clone(&inner);
        runtime::register(node.with_runner(Runner::Owned(runner)));

        // Writes made by the first run are flushed once it has finished.
        let first_run = run_batched(|| {
            panic::catch_unwind(AssertUnwindSafe(|| runtime::update_if_necessary(id)))
        });
        match first_run {
            Ok(Ok(())) => Self { inner },
            Ok(Err(err)) => {
                runtime::dispose(id);
                err.raise()
            }
            Err(payload) => {
                runtime::dispose(id);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Get the effect's graph node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Dispose of the effect.
    ///
    /// Runs its cleanups, disposes anything it created, and detaches it from
    /// its dependencies. After disposal, the effect will not run again.
    pub fn dispose(&self) {
        runtime::dispose(self.inner.id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.inner.id)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Get the number of dependencies recorded by the latest run.
    pub fn dependency_count(&self) -> usize {
        runtime::dependency_count(self.inner.id)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect and run it once.
pub fn create_effect<F>(body: F) -> Effect
where
    F: FnMut() + 'static,
{
    Effect::new(body)
}

/// Create an effect whose body returns a cleanup for each run.
pub fn create_effect_with_cleanup<F, C>(body: F) -> Effect
where
    F: FnMut() -> C + 'static,
    C: FnOnce() + 'static,
{
    Effect::with_cleanup(body)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
