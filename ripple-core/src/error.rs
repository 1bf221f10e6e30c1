//! Error types for the reactive runtime.

use thiserror::Error;

use crate::graph::{NodeId, NodeKind};

/// Errors surfaced by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A consumer was re-entered while its own body was still running:
    /// a computed that reads itself, or a body that writes a value it
    /// depends on.
    #[error("cyclic dependency: {kind} {node} was re-entered while it was still running")]
    Cycle { node: NodeId, kind: NodeKind },

    /// A computed was disposed before it ever produced a value.
    #[error("computed {node} was disposed before it produced a value")]
    Disposed { node: NodeId },

    /// An effect body panicked during a flush.
    #[error("effect {node} panicked: {message}")]
    EffectPanicked { node: NodeId, message: String },

    /// A single flush ran more effects than the configured limit.
    #[error("flush exceeded {limit} effect runs; effects keep re-triggering each other")]
    RunawayFlush { limit: usize },
}

impl ReactiveError {
    /// Raise this error as a panic, the way infallible accessors report it.
    pub(crate) fn raise(self) -> ! {
        panic!("{self}")
    }
}

/// Errors from serializing a [`GraphSnapshot`](crate::GraphSnapshot).
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode snapshot as MessagePack: {0}")]
    MessagePack(#[from] rmp_serde::encode::Error),
}
