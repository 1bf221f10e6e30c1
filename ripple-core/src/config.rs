//! Runtime Configuration
//!
//! Each thread's runtime starts with [`RuntimeConfig::default`]. Install a
//! different one with [`Runtime::configure`](crate::Runtime::configure),
//! usually once at startup before any reactive nodes exist.

use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;

/// Callback that receives errors raised by effects during a flush.
pub type ErrorHandler = Rc<dyn Fn(&ReactiveError)>;

/// Default cap on effect runs within a single flush.
pub const DEFAULT_MAX_FLUSH_RUNS: usize = 100_000;

/// Tunables for a thread's reactive runtime.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Upper bound on effect runs in one flush. Exceeding it drops the rest
    /// of the queue and reports [`ReactiveError::RunawayFlush`].
    pub max_flush_runs: usize,

    /// Receives effect errors once a flush completes. Without a handler the
    /// first effect panic is resumed on the flush driver's stack.
    pub error_handler: Option<ErrorHandler>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_flush_runs(mut self, limit: usize) -> Self {
        self.max_flush_runs = limit.max(1);
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ReactiveError) + 'static,
    {
        self.error_handler = Some(Rc::new(handler));
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_runs: DEFAULT_MAX_FLUSH_RUNS,
            error_handler: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("max_flush_runs", &self.max_flush_runs)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = RuntimeConfig::new()
            .with_max_flush_runs(0)
            .with_error_handler(|_| {});

        assert_eq!(config.max_flush_runs, 1);
        assert!(config.error_handler.is_some());
        assert_eq!(
            format!("{config:?}"),
            "RuntimeConfig { max_flush_runs: 1, error_handler: true }"
        );
    }

    #[test]
    fn default_has_no_handler() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_flush_runs, DEFAULT_MAX_FLUSH_RUNS);
        assert!(config.error_handler.is_none());
    }
}
