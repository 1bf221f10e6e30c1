//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes computeds and effects. The graph stores subscribers
//! type-erased, so it can re-run them without knowing their value type.

use crate::graph::NodeId;

/// A computation the runtime can re-run when its dependencies change.
pub(crate) trait Subscriber {
    /// The graph node this computation is attached to.
    fn node_id(&self) -> NodeId;

    /// Run the computation once, inside a tracking context the runtime has
    /// already entered.
    ///
    /// Returns whether the observable output changed. Effects always report
    /// a change; computeds compare against their cached value.
    fn run(&self) -> bool;
}
