//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, plus the scopes that own them. These primitives form the
//! foundation of Ripple's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a dependent. When the signal's
//! value changes, all dependents are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changes, and only when something reads it.
//! Computeds are useful for expensive computations that should not be
//! repeated unnecessarily.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as updating the DOM or logging.
//!
//! ## Scopes
//!
//! A Scope owns the nodes created inside it. Disposing a scope disposes
//! everything it owns and runs the registered cleanups.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod batch;
mod computed;
mod context;
mod effect;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub(crate) use subscriber::Subscriber;

pub use batch::run_batched;
pub use computed::{create_computed, Computed};
pub use context::{run_untracked, ReactiveContext};
pub use effect::{create_effect, create_effect_with_cleanup, Effect};
pub use runtime::Runtime;
pub use scope::{on_cleanup, with_root, Scope};
pub use signal::{create_signal, Signal};
