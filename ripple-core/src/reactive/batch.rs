//! Batching
//!
//! Inside `run_batched`, writes still update values and dirty flags right
//! away, but queued effects wait until the outermost batch closes. An effect
//! dirtied by several writes in one batch runs once.

use super::runtime::{flush_if_idle, try_with_runtime, with_runtime};

/// Keeps the batch depth balanced if the batched closure panics.
struct Batch;

impl Batch {
    fn open() -> Self {
        with_runtime(|rt| rt.scheduler_mut().enter_batch());
        Batch
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.scheduler_mut().exit_batch());
    }
}

/// Run `f` with effect reruns deferred, then flush once.
///
/// Nested calls only flush when the outermost one returns. If `f` panics
/// the depth is restored but queued effects stay queued until the next
/// write flushes them.
pub fn run_batched<R>(f: impl FnOnce() -> R) -> R {
    let result = {
        let _batch = Batch::open();
        f()
    };
    flush_if_idle();
    result
}
