//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the dependency graph and the scheduler, and drives
//! updates when signals change.
//!
//! # How It Works
//!
//! 1. When a node is created, it registers with the runtime and is adopted
//!    by the current owner.
//!
//! 2. When a computed or effect reads a signal, the runtime records the
//!    dependency edge.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks direct dependents dirty and everything further downstream
//!       maybe dirty
//!    b. Queues the effects it reached
//!    c. Flushes the queue, unless a batch or a flush is already open
//!    d. Leaves computeds alone; they recompute on next access
//!
//! # Thread Model
//!
//! Every thread has its own runtime in thread-local storage. The runtime is
//! borrowed only for short bookkeeping steps and never while user code runs,
//! so user closures are free to read, write, create and dispose nodes.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use super::context::ReactiveContext;
use super::subscriber::Subscriber;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{
    Cleanup, DirtyState, Graph, GraphSnapshot, Node, NodeId, NodeKind, Scheduler, Teardown,
    Touched,
};

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());

    // Nodes whose handles were dropped while the runtime was borrowed.
    static RELEASED: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// The per-thread reactive runtime.
///
/// Handles talk to it through crate-internal functions; the associated
/// functions here are the public configuration and inspection surface.
pub struct Runtime {
    graph: Graph,
    scheduler: Scheduler,
    config: RuntimeConfig,
}

/// An effect run that failed during a flush.
enum Failure {
    Error(ReactiveError),
    Panic {
        node: NodeId,
        payload: Box<dyn Any + Send>,
    },
}

impl Failure {
    fn to_error(&self) -> ReactiveError {
        match self {
            Failure::Error(err) => err.clone(),
            Failure::Panic { node, payload } => ReactiveError::EffectPanicked {
                node: *node,
                message: panic_message(payload.as_ref()),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|runtime| f(&mut runtime.borrow_mut()))
}

/// Like [`with_runtime`], but gives up instead of panicking when the runtime
/// is borrowed or the thread is shutting down.
pub(crate) fn try_with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    RUNTIME
        .try_with(|runtime| runtime.try_borrow_mut().ok().map(|mut rt| f(&mut rt)))
        .ok()
        .flatten()
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: Graph::new(),
            scheduler: Scheduler::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// Install a configuration for the current thread's runtime.
    pub fn configure(config: RuntimeConfig) {
        let previous = with_runtime(|rt| std::mem::replace(&mut rt.config, config));
        drop(previous);
    }

    /// The configuration currently in effect on this thread.
    pub fn config() -> RuntimeConfig {
        with_runtime(|rt| rt.config.clone())
    }

    /// Capture the current thread's graph.
    pub fn snapshot() -> GraphSnapshot {
        with_runtime(|rt| GraphSnapshot::capture(&rt.graph, &rt.scheduler))
    }

    /// Whether no tracking frame, owner, batch or queued effect is
    /// outstanding. True between top-level operations.
    pub fn is_idle() -> bool {
        with_runtime(|rt| rt.scheduler.is_idle())
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_effects() -> usize {
        with_runtime(|rt| rt.scheduler.pending().len())
    }

    /// Number of live nodes on this thread.
    pub fn node_count() -> usize {
        with_runtime(|rt| rt.graph.node_count())
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        with_runtime(|rt| rt.scheduler.current_observer().is_some())
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Remove a node and its owned subtree from the graph and the queue.
    fn take_subtree(&mut self, node_id: NodeId) -> Teardown {
        let mut teardown = Teardown::default();
        self.graph.dispose(node_id, &mut teardown);
        for disposed in &teardown.disposed {
            self.scheduler.dequeue(*disposed);
        }
        teardown
    }

    /// Clear a consumer's edges, owned nodes and cleanups ahead of a run.
    fn take_previous_run(&mut self, node_id: NodeId) -> Teardown {
        let mut teardown = Teardown::default();
        self.scheduler.dequeue(node_id);
        self.graph.reset_for_rerun(node_id, &mut teardown);
        for disposed in &teardown.disposed {
            self.scheduler.dequeue(*disposed);
        }
        teardown
    }

    /// Queue the effects among `touched`, and report a cycle if any touched
    /// node is in the middle of its own run.
    fn schedule(&mut self, touched: Touched) -> Result<(), ReactiveError> {
        let mut effects: Touched = SmallVec::new();
        let mut cycle = None;

        for node_id in touched {
            let Some(node) = self.graph.get_node(node_id) else {
                continue;
            };
            if node.is_running() {
                cycle.get_or_insert(ReactiveError::Cycle {
                    node: node_id,
                    kind: node.kind(),
                });
                continue;
            }
            if node.kind() == NodeKind::Effect {
                effects.push(node_id);
            }
        }

        if !effects.is_empty() {
            effects.sort_unstable();
            trace!(count = effects.len(), "queueing effects");
            self.scheduler.enqueue(effects);
        }

        cycle.map_or(Ok(()), Err)
    }
}

/// Register a freshly built node, adopting it into the current owner.
pub(crate) fn register(node: Node) -> NodeId {
    with_runtime(|rt| {
        // A disposed owner cannot adopt anything.
        let owner = rt
            .scheduler
            .current_owner()
            .filter(|owner| rt.graph.contains(*owner));
        let node_id = rt.graph.add_node(node.with_owner(owner));
        trace!(node = %node_id, "registered node");
        node_id
    })
}

pub(crate) fn contains(node_id: NodeId) -> bool {
    with_runtime(|rt| rt.graph.contains(node_id))
}

pub(crate) fn state_of(node_id: NodeId) -> Option<DirtyState> {
    with_runtime(|rt| rt.graph.state_of(node_id))
}

pub(crate) fn subscriber_count(node_id: NodeId) -> usize {
    with_runtime(|rt| {
        rt.graph
            .get_node(node_id)
            .map_or(0, |node| node.dependents().len())
    })
}

pub(crate) fn dependency_count(node_id: NodeId) -> usize {
    with_runtime(|rt| {
        rt.graph
            .get_node(node_id)
            .map_or(0, |node| node.dependencies().len())
    })
}

/// Record that the current observer, if any, read `source`.
pub(crate) fn track(source: NodeId) {
    with_runtime(|rt| {
        if let Some(observer) = rt.scheduler.current_observer() {
            if rt.graph.add_edge(source, observer) {
                trace!(source = %source, observer = %observer, "tracked dependency");
            }
        }
    });
}

/// Propagate a change of `source` and run whatever it triggered.
///
/// Panics with [`ReactiveError::Cycle`] when the change reaches a consumer
/// that is still running.
pub(crate) fn notify_changed(source: NodeId) {
    let scheduled = with_runtime(|rt| {
        let touched = rt.graph.mark_changed(source);
        rt.schedule(touched)
    });
    if let Err(err) = scheduled {
        err.raise();
    }
    flush_if_idle();
}

/// Attach a cleanup to a specific node. Runs it right away if the node is
/// already gone.
pub(crate) fn add_cleanup(node_id: NodeId, cleanup: Cleanup) {
    let rejected = with_runtime(|rt| match rt.graph.get_node_mut(node_id) {
        Some(node) => {
            node.push_cleanup(cleanup);
            None
        }
        None => Some(cleanup),
    });
    if let Some(cleanup) = rejected {
        run_untracked_cleanups(vec![cleanup]);
    }
}

/// Attach a cleanup to the innermost owner.
pub(crate) fn on_cleanup(cleanup: Cleanup) {
    let rejected = with_runtime(|rt| {
        let owner = rt.scheduler.current_owner();
        match owner.and_then(|owner| rt.graph.get_node_mut(owner)) {
            Some(node) => {
                node.push_cleanup(cleanup);
                None
            }
            None => Some(cleanup),
        }
    });
    if let Some(cleanup) = rejected {
        warn!("on_cleanup called outside of any scope or effect; the callback will never run");
        drop(cleanup);
    }
}

/// Dispose a node and everything it owns, running their cleanups.
pub(crate) fn dispose(node_id: NodeId) {
    let teardown = with_runtime(|rt| rt.take_subtree(node_id));
    finish_teardown(teardown);
}

/// Dispose a node whose handle was dropped.
///
/// Safe to call from `Drop`: if the runtime is busy the node is parked and
/// disposed on the next flush; if the thread is exiting it is ignored.
pub(crate) fn release(node_id: NodeId) {
    match try_with_runtime(|rt| rt.take_subtree(node_id)) {
        Some(teardown) => finish_teardown(teardown),
        None => {
            let _ = RELEASED.try_with(|released| released.borrow_mut().push(node_id));
        }
    }
}

fn drain_released() {
    let released = RELEASED
        .try_with(|released| std::mem::take(&mut *released.borrow_mut()))
        .unwrap_or_default();
    for node_id in released {
        dispose(node_id);
    }
}

fn finish_teardown(teardown: Teardown) {
    if teardown.is_empty() {
        return;
    }
    let Teardown {
        cleanups,
        runners,
        disposed,
    } = teardown;
    if !disposed.is_empty() {
        debug!(count = disposed.len(), "disposed reactive nodes");
    }
    run_untracked_cleanups(cleanups);
    // Runners may own closures holding other handles; drop them only now
    // that the runtime is free.
    drop(runners);
}

/// Run cleanups outside any tracking context, coalescing their writes.
fn run_untracked_cleanups(cleanups: Vec<Cleanup>) {
    if cleanups.is_empty() {
        return;
    }
    super::batch::run_batched(|| {
        let _context = ReactiveContext::untracked();
        for cleanup in cleanups {
            cleanup();
        }
    });
}

/// Bring a consumer up to date.
///
/// Clean nodes are left alone. Maybe-dirty nodes first bring their computed
/// dependencies up to date, in the order they were read, and only re-run if
/// one of those actually changed. Dirty nodes re-run. Missing (disposed)
/// nodes are ignored.
pub(crate) fn update_if_necessary(node_id: NodeId) -> Result<(), ReactiveError> {
    let status = with_runtime(|rt| {
        rt.graph
            .get_node(node_id)
            .map(|node| (node.dirty_state(), node.is_running(), node.kind()))
    });
    let Some((state, running, kind)) = status else {
        return Ok(());
    };
    if running {
        return Err(ReactiveError::Cycle {
            node: node_id,
            kind,
        });
    }

    match state {
        DirtyState::Clean => return Ok(()),
        DirtyState::MaybeDirty => {
            let dependencies: Touched = with_runtime(|rt| {
                rt.graph
                    .get_node(node_id)
                    .map(|node| node.dependencies().iter().copied().collect())
                    .unwrap_or_default()
            });
            for dependency in dependencies {
                if with_runtime(|rt| rt.graph.kind_of(dependency)) == Some(NodeKind::Derived) {
                    update_if_necessary(dependency)?;
                }
                if state_of(node_id) != Some(DirtyState::MaybeDirty) {
                    break;
                }
            }

            let settled = with_runtime(|rt| match rt.graph.get_node_mut(node_id) {
                Some(node) if node.dirty_state() == DirtyState::MaybeDirty => {
                    node.mark_clean();
                    true
                }
                Some(node) => node.is_clean(),
                None => true,
            });
            if settled {
                return Ok(());
            }
        }
        DirtyState::Dirty => {}
    }

    let runner = with_runtime(|rt| {
        rt.graph
            .get_node(node_id)
            .and_then(|node| node.runner())
            .and_then(|runner| runner.upgrade())
    });
    match runner {
        Some(runner) => execute(node_id, runner),
        None => Ok(()),
    }
}

/// Run a consumer's body under tracking.
fn execute(node_id: NodeId, runner: Rc<dyn Subscriber>) -> Result<(), ReactiveError> {
    debug_assert_eq!(runner.node_id(), node_id);

    let previous = with_runtime(|rt| rt.take_previous_run(node_id));
    finish_teardown(previous);

    let changed = {
        let _context = ReactiveContext::enter(node_id);
        runner.run()
    };

    with_runtime(|rt| {
        let dependents: Touched = match rt.graph.get_node(node_id) {
            Some(node) if changed && node.kind() == NodeKind::Derived => {
                node.dependents().iter().copied().collect()
            }
            _ => return Ok(()),
        };
        let touched = rt.graph.mark_dirty(&dependents);
        rt.schedule(touched)
    })
}

pub(crate) fn flush_if_idle() {
    drain_released();
    if with_runtime(|rt| rt.scheduler.should_flush()) {
        flush();
    }
}

/// Clears the flushing flag even if reporting unwinds.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        try_with_runtime(|rt| rt.scheduler.set_flushing(false));
    }
}

/// Drain the effect queue.
///
/// Effects queued while the flush runs join the same wave. A failing effect
/// does not stop the others; failures are reported once the queue is empty.
fn flush() {
    let limit = with_runtime(|rt| {
        rt.scheduler.set_flushing(true);
        rt.config.max_flush_runs
    });
    let guard = FlushGuard;

    let mut failures = Vec::new();
    let mut runs = 0usize;

    while let Some(effect) = with_runtime(|rt| rt.scheduler.next_pending()) {
        if runs == limit {
            let dropped = with_runtime(|rt| rt.scheduler.clear_pending()) + 1;
            warn!(limit, dropped, "flush exceeded its run limit; dropping queued effects");
            failures.push(Failure::Error(ReactiveError::RunawayFlush { limit }));
            break;
        }
        runs += 1;

        match panic::catch_unwind(AssertUnwindSafe(|| update_if_necessary(effect))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => failures.push(Failure::Error(err)),
            Err(payload) => failures.push(Failure::Panic {
                node: effect,
                payload,
            }),
        }
    }

    drop(guard);
    debug!(runs, failures = failures.len(), "flush complete");
    report(failures);
}

/// Hand flush failures to the configured handler, or resume the first one.
fn report(failures: Vec<Failure>) {
    if failures.is_empty() {
        return;
    }

    let handler = with_runtime(|rt| rt.config.error_handler.clone());
    if let Some(handler) = handler {
        for failure in &failures {
            handler(&failure.to_error());
        }
        return;
    }

    let mut failures = failures.into_iter();
    let first = failures.next();
    for failure in failures {
        error!(error = %failure.to_error(), "effect failed during flush");
    }
    match first {
        Some(Failure::Panic { payload, .. }) => panic::resume_unwind(payload),
        Some(Failure::Error(err)) => err.raise(),
        None => {}
    }
}
