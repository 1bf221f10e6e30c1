//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are marked dirty and
//!    effects among them are scheduled.
//!
//! 3. Writing a value equal to the current one does nothing at all.
//!
//! # Equality
//!
//! `Signal::new` compares with `PartialEq`. Types without a meaningful
//! `PartialEq`, or callers that want every write to notify, supply their own
//! comparator through [`Signal::with_equality`].
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A graph node id (8 bytes)
//! - The value, behind a shared `Rc<RefCell<_>>`
//! - The equality comparator
//!
//! Subscribers live in the graph, not in the handle.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime;
use crate::graph::{Node, NodeId};

type Equality<T> = Box<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
    /// Graph node for this signal.
    id: NodeId,

    /// The current value.
    value: RefCell<T>,

    /// Decides whether a write is a change.
    equals: Equality<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        runtime::release(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell. The node is
/// removed from the graph when the last handle is dropped or when its
/// owning scope is disposed; writes after disposal are ignored.
///
/// # Example
///
/// ```rust
/// use ripple_core::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.read(), 0);
///
/// // Update the value (notifies subscribers)
/// count.write(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.peek(), 6);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equality(value, |a, b| a == b)
    }

    /// Create a signal that uses `equals` to decide whether a write changed
    /// the value.
    pub fn with_equality<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        let node = Node::source();
        let id = node.id();
        runtime::register(node);

        Self {
            inner: Rc::new(SignalInner {
                id,
                value: RefCell::new(value),
                equals: Box::new(equals),
            }),
        }
    }

    /// Get the signal's graph node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        runtime::track(self.inner.id);
        self.peek()
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, tracking the read.
    ///
    /// The value stays borrowed while `f` runs, so `f` must not write to
    /// this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        runtime::track(self.inner.id);
        self.with_untracked(f)
    }

    /// Borrow the current value without tracking dependencies.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Does nothing if the new value equals the current one, or if the
    /// signal has been disposed. Dependent effects run before this returns
    /// unless a batch or flush is already in progress.
    pub fn write(&self, value: T) {
        if !runtime::contains(self.inner.id) {
            return;
        }

        let previous = {
            let mut current = self.inner.value.borrow_mut();
            if (self.inner.equals)(&*current, &value) {
                return;
            }
            std::mem::replace(&mut *current, value)
        };
        drop(previous);

        runtime::notify_changed(self.inner.id);
    }

    /// Update the value using a function of the current value.
    ///
    /// The current value is read without tracking, even inside an effect.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with_untracked(f);
        self.write(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        runtime::subscriber_count(self.inner.id)
    }

    /// Whether the signal's owner has disposed it.
    pub fn is_disposed(&self) -> bool {
        !runtime::contains(self.inner.id)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &runtime::subscriber_count(self.inner.id))
            .finish()
    }
}

/// Create a signal with `PartialEq` change detection.
pub fn create_signal<T: PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
