//! Ripple Core
//!
//! This crate provides the reactivity engine for the Ripple reactive UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Ownership scopes with cleanup callbacks
//! - Batched, glitch-free change propagation
//! - Cycle detection
//! - Graph snapshots for devtools and debugging
//!
//! Everything is single-threaded: each thread gets its own runtime, and
//! handles are neither `Send` nor `Sync`.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependency graph, effect queue and snapshots
//! - `error`: Errors surfaced by the runtime
//! - `config`: Per-thread runtime settings
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ripple_core::{create_computed, create_effect, create_signal, run_batched};
//!
//! // Create a signal
//! let count = create_signal(0);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     create_computed(move || count.read() * 2)
//! };
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let _effect = {
//!     let (count, doubled, seen) = (count.clone(), doubled.clone(), seen.clone());
//!     create_effect(move || seen.borrow_mut().push((count.read(), doubled.read())))
//! };
//!
//! // Update the signal twice; the effect runs once with the final values
//! run_batched(|| {
//!     count.write(1);
//!     count.write(5);
//! });
//! assert_eq!(*seen.borrow(), vec![(0, 0), (5, 10)]);
//! ```

mod config;
mod error;
mod graph;
pub mod reactive;

pub use config::{ErrorHandler, RuntimeConfig, DEFAULT_MAX_FLUSH_RUNS};
pub use error::{ReactiveError, SnapshotError};
pub use graph::{Cleanup, DirtyState, GraphSnapshot, NodeId, NodeKind, NodeSnapshot};
pub use reactive::{
    create_computed, create_effect, create_effect_with_cleanup, create_signal, on_cleanup,
    run_batched, run_untracked, with_root, Computed, Effect, ReactiveContext, Runtime, Scope,
    Signal,
};
