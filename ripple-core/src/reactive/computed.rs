//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. Creating a computed runs nothing. On first access, it runs its
//!    derivation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns the
//!    cached value.
//!
//! 3. When a signal it reads directly changes, the computed is marked
//!    "dirty". When something further upstream changes, it is marked
//!    "maybe dirty".
//!
//! 4. On next access, a maybe-dirty computed first brings its own computed
//!    inputs up to date. If none of them produced a different value, it is
//!    marked clean and the cache is returned.
//!
//! 5. Otherwise it recomputes. If the new value equals the old one, its own
//!    dependents are not disturbed.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 computeds depend on it
//! - Only the computeds actually accessed will recompute
//! - Computeds that are never read stay dirty (no wasted work)
//!
//! It is also glitch-free: in a diamond, the bottom node recomputes once,
//! after both branches are up to date.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::runtime;
use super::subscriber::Subscriber;
use crate::error::ReactiveError;
use crate::graph::{DirtyState, Node, NodeId, Runner};

type Equality<T> = Box<dyn Fn(&T, &T) -> bool>;

struct ComputedInner<T> {
    /// Graph node for this computed.
    id: NodeId,

    /// The derivation function.
    derive: Box<dyn Fn() -> T>,

    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    /// Decides whether a recompute produced a new value.
    equals: Equality<T>,
}

impl<T> Subscriber for ComputedInner<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn run(&self) -> bool {
        let next = (self.derive)();

        let previous = {
            let mut cached = self.value.borrow_mut();
            if let Some(current) = cached.as_ref() {
                if (self.equals)(current, &next) {
                    return false;
                }
            }
            cached.replace(next)
        };
        drop(previous);
        true
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
///
/// `Computed::new` needs `PartialEq` to detect when the computed value
/// actually changed (some derivations return the same value even if inputs
/// changed). Use [`Computed::with_equality`] otherwise.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let doubled = {
///     let count = count.clone();
///     Computed::new(move || count.read() * 2)
/// };
///
/// assert_eq!(doubled.read(), 4);
/// count.write(5);
/// assert_eq!(doubled.read(), 10);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Computed<T> {
    /// Create a new computed with the given derivation function.
    ///
    /// The derivation is not run immediately. It runs on first access.
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> T + 'static,
        T: PartialEq,
    {
        Self::with_equality(derive, |a, b| a == b)
    }

    /// Create a computed that uses `equals` to decide whether a recompute
    /// produced a new value.
    pub fn with_equality<F, E>(derive: F, equals: E) -> Self
    where
        F: Fn() -> T + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        let node = Node::derived();
        let id = node.id();

        let inner = Rc::new(ComputedInner {
            id,
            derive: Box::new(derive),
            value: RefCell::new(None),
            equals: Box::new(equals),
        });
        let runner: Weak<ComputedInner<T>> = Rc::downgrade(&inner);
        runtime::register(node.with_runner(Runner::Borrowed(runner)));

        Self { inner }
    }

    /// Get the computed's graph node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary, and track the read.
    ///
    /// # Panics
    ///
    /// Panics if the derivation panics, on a dependency cycle, or if the
    /// computed was disposed before it ever produced a value. Use
    /// [`Computed::try_read`] to get the latter two as errors.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.try_read().unwrap_or_else(|err| err.raise())
    }

    /// Get the current value, recomputing if necessary, and track the read.
    pub fn try_read(&self) -> Result<T, ReactiveError>
    where
        T: Clone,
    {
        self.refresh()?;
        runtime::track(self.inner.id);
        self.cached()
    }

    /// Get the current value, recomputing if necessary, without tracking.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.try_peek().unwrap_or_else(|err| err.raise())
    }

    /// Get the current value, recomputing if necessary, without tracking.
    pub fn try_peek(&self) -> Result<T, ReactiveError>
    where
        T: Clone,
    {
        self.refresh()?;
        self.cached()
    }

    fn refresh(&self) -> Result<(), ReactiveError> {
        runtime::update_if_necessary(self.inner.id)?;
        runtime::flush_if_idle();
        Ok(())
    }

    fn cached(&self) -> Result<T, ReactiveError>
    where
        T: Clone,
    {
        self.inner
            .value
            .borrow()
            .clone()
            .ok_or(ReactiveError::Disposed {
                node: self.inner.id,
            })
    }

    /// Whether the next read will have to recompute or verify inputs.
    pub fn is_dirty(&self) -> bool {
        matches!(
            runtime::state_of(self.inner.id),
            Some(DirtyState::Dirty | DirtyState::MaybeDirty)
        )
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        runtime::subscriber_count(self.inner.id)
    }

    /// Whether the computed's owner has disposed it.
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.inner.id)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &runtime::state_of(self.inner.id))
            .field("value", &*self.inner.value.borrow())
            .field("dependent_count", &runtime::subscriber_count(self.inner.id))
            .finish()
    }
}

/// Create a computed with `PartialEq` change detection.
pub fn create_computed<T, F>(derive: F) -> Computed<T>
where
    T: PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(derive)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
