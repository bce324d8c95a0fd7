use core::fmt::Debug;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Deserialize;

/// Configuration entry-point for instantiating a processor graph.
///
/// A concrete `Config` binds the type of the values that processors exchange
/// through the [`ValueStore`](crate::store::ValueStore).
pub trait Config: Sized + Send + Sync + 'static {
    /// Opaque value stored under each attribute name.
    type Value: Debug + Send + Sync + 'static;
}

/// Settings of the worker pool that executes graph branches.
///
/// Every field is optional; an empty document yields rayon's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of worker threads. `None` or `0` lets rayon decide.
    pub num_threads: Option<usize>,
    /// Worker threads are named `<prefix>-<index>`.
    pub thread_name_prefix: Option<String>,
    /// Stack size of each worker, in bytes.
    pub stack_size: Option<usize>,
}

impl PoolConfig {
    /// Pool configuration with a fixed number of workers.
    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Self::default()
        }
    }

    /// Build the worker pool.
    ///
    /// # Errors
    /// If the operating system refuses to spawn the worker threads.
    pub fn build(&self) -> Result<ThreadPool, ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }
        if let Some(prefix) = self.thread_name_prefix.clone() {
            builder = builder.thread_name(move |idx| format!("{prefix}-{idx}"));
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.build()
    }
}
