use crate::{config::Config, error::ExecutionError, latch::ArrivalCounter, store::ValueStore};
use derive_more::Debug;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tracing::{debug, warn};

/// Shared flag through which a running execution can be stopped.
///
/// Node tasks check it before starting their processor; processors already
/// running are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters collected during one execution.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Processors whose `execute` was called.
    pub executed: usize,
    /// Processors skipped because they were disabled.
    pub skipped: usize,
    /// Node tasks handed to the worker pool instead of running inline.
    pub forked: usize,
}

/// Successful outcome of one execution.
#[derive(Debug)]
pub struct ExecutionReport<C: Config> {
    /// Store holding the caller's inputs and every committed output.
    pub values: ValueStore<C>,
    /// Execution counters.
    pub stats: ExecutionStats,
}

/// State of one graph execution.
///
/// The graph itself is immutable; everything that changes while it runs lives
/// here, so one graph can serve any number of concurrent executions.
#[derive(Debug)]
pub struct ExecutionContext<C: Config> {
    values: ValueStore<C>,
    /// Indexed by node index.
    #[debug(skip)]
    arrivals: Box<[ArrivalCounter]>,
    cancellation: CancellationFlag,
    failure: OnceLock<ExecutionError>,
    /// Set once cancellation has kept some node from running.
    interrupted: AtomicBool,
    executed: AtomicUsize,
    skipped: AtomicUsize,
    forked: AtomicUsize,
}

impl<C: Config> ExecutionContext<C> {
    pub(crate) fn new(values: ValueStore<C>, parent_counts: &[usize]) -> Self {
        Self {
            values,
            arrivals: parent_counts.iter().copied().map(ArrivalCounter::new).collect(),
            cancellation: CancellationFlag::default(),
            failure: OnceLock::new(),
            interrupted: AtomicBool::new(false),
            executed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            forked: AtomicUsize::new(0),
        }
    }

    /// The store shared by every processor of this execution.
    #[must_use]
    pub fn values(&self) -> &ValueStore<C> {
        &self.values
    }

    /// Handle that cancels this execution.
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Whether no further processor should start, either because of an
    /// explicit cancellation or because a processor failed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Counters collected so far.
    #[must_use]
    pub fn stats(&self) -> ExecutionStats {
        ExecutionStats {
            executed: self.executed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            forked: self.forked.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn arrival(&self, node_index: usize) -> &ArrivalCounter {
        &self.arrivals[node_index]
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupted(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub(crate) fn record_forked(&self, count: usize) {
        self.forked.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failure and stop scheduling new processors. Only the first
    /// failure is kept.
    pub(crate) fn fail(&self, error: ExecutionError) {
        self.cancellation.cancel();
        match self.failure.set(error) {
            Ok(()) => debug!("graph execution failed, cancelling pending processors"),
            Err(error) => warn!(%error, "discarding failure observed after the first one"),
        }
    }

    /// Outcome of the execution once every task has been joined.
    ///
    /// A cancellation requested after the last node started does not fail the
    /// execution: it is only reported when some node was kept from running.
    pub(crate) fn finish(self) -> Result<ExecutionReport<C>, ExecutionError> {
        let stats = self.stats();
        let Self {
            values,
            failure,
            interrupted,
            ..
        } = self;
        if let Some(error) = failure.into_inner() {
            return Err(error);
        }
        if interrupted.into_inner() {
            return Err(ExecutionError::Cancelled);
        }
        Ok(ExecutionReport { values, stats })
    }
}
