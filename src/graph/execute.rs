use crate::{
    config::Config,
    context::{CancellationFlag, ExecutionContext, ExecutionReport},
    error::ExecutionError,
    graph::ProcessorDependencyGraph,
    node::ProcessorNode,
    store::ValueStore,
};
use derive_more::Debug;
use rayon::{Scope, ThreadPool};
use tracing::{debug, trace};

/// Where forked node tasks are sent.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Scheduler<'a> {
    /// The pool of the current worker thread, or rayon's global pool.
    Current,
    Pool(&'a ThreadPool),
}

impl Scheduler<'_> {
    /// Run `op` on the calling thread; tasks it spawns go to the pool, and the
    /// call returns once all of them have completed.
    fn in_place_scope<'scope, OP, R>(self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R,
    {
        match self {
            Self::Current => rayon::in_place_scope(op),
            Self::Pool(pool) => pool.in_place_scope(op),
        }
    }
}

/// Run `tasks` to completion: every task but the first is forked to the pool,
/// the first runs on the calling thread, then all forked tasks are joined.
///
/// With a single task nothing is forked and the pool is not touched.
fn fork_join<C: Config>(tasks: Vec<NodeTask<'_, C>>) {
    let mut tasks = tasks.into_iter();
    let Some(first) = tasks.next() else {
        return;
    };
    if tasks.len() == 0 {
        first.compute();
        return;
    }
    let (context, scheduler) = (first.context, first.scheduler);
    context.record_forked(tasks.len());
    scheduler.in_place_scope(|scope| {
        for task in tasks {
            scope.spawn(move |_| task.compute());
        }
        // Keep the calling thread busy instead of idling until the join.
        first.compute();
    });
}

/// Execution of one node within one graph execution.
///
/// Obtained from [`ProcessorNode::create_task`]. Running it executes the
/// node's processor, commits its outputs and then runs every child whose
/// parents have all completed.
#[must_use]
#[derive(Debug)]
pub struct NodeTask<'a, C: Config> {
    node: &'a ProcessorNode<C>,
    #[debug(skip)]
    context: &'a ExecutionContext<C>,
    scheduler: Scheduler<'a>,
}

impl<'a, C: Config> NodeTask<'a, C> {
    pub(crate) fn new(
        node: &'a ProcessorNode<C>,
        context: &'a ExecutionContext<C>,
        scheduler: Scheduler<'a>,
    ) -> Self {
        Self {
            node,
            context,
            scheduler,
        }
    }

    /// The node this task runs.
    #[must_use]
    pub fn node(&self) -> &'a ProcessorNode<C> {
        self.node
    }

    /// Run the node and, transitively, the descendants it unlocks.
    ///
    /// A failure is recorded in the execution context, which stops any
    /// processor that has not started yet.
    ///
    /// A chain of nodes each unlocking a single child runs in a loop on the
    /// current thread, so stack usage does not grow with the chain length.
    pub fn compute(self) {
        let Self {
            mut node,
            context,
            scheduler,
        } = self;
        loop {
            if context.is_cancelled() {
                trace!(processor = node.processor().name(), "execution cancelled, not starting");
                context.record_interrupted();
                return;
            }
            if let Err(error) = node.execute(context) {
                context.fail(error);
                return;
            }
            // Children whose last parent is this node are ready now. Outputs are
            // committed before arriving, so they see everything written above.
            let mut ready: Vec<_> = node
                .children()
                .iter()
                .filter(|child| child.arrive(context))
                .filter_map(|child| child.create_scheduled_task(context, scheduler))
                .collect();
            if ready.len() == 1 {
                node = ready.pop().expect("NodeTask::compute: [1]").node;
                continue;
            }
            fork_join(ready);
            return;
        }
    }
}

/// Execution of a whole graph over one value store.
///
/// Created by [`ProcessorDependencyGraph::create_task`]; no processor has run
/// until it is invoked.
#[must_use]
#[derive(Debug)]
pub struct GraphExecutionTask<'g, C: Config> {
    #[debug(skip)]
    graph: &'g ProcessorDependencyGraph<C>,
    context: ExecutionContext<C>,
}

impl<'g, C: Config> GraphExecutionTask<'g, C> {
    pub(crate) fn new(graph: &'g ProcessorDependencyGraph<C>, values: ValueStore<C>) -> Self {
        Self {
            graph,
            context: ExecutionContext::new(values, graph.parent_counts()),
        }
    }

    /// State of this execution.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext<C> {
        &self.context
    }

    /// Handle that cancels this execution, usable from another thread while
    /// it runs.
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.context.cancellation()
    }

    /// Run the graph, forking parallel branches to `pool`.
    ///
    /// The calling thread runs the first root itself and blocks until every
    /// branch has completed.
    ///
    /// # Errors
    /// The first failure recorded during the execution, or
    /// [`ExecutionError::Cancelled`] if cancellation kept a processor from
    /// running.
    pub fn invoke(self, pool: &ThreadPool) -> Result<ValueStore<C>, ExecutionError> {
        self.invoke_with_stats(pool).map(|report| report.values)
    }

    /// Same as [`invoke`](Self::invoke), also returning execution counters.
    ///
    /// # Errors
    /// See [`invoke`](Self::invoke).
    pub fn invoke_with_stats(self, pool: &ThreadPool) -> Result<ExecutionReport<C>, ExecutionError> {
        self.run(Scheduler::Pool(pool))
    }

    /// Run the graph on the pool of the current worker thread, or on rayon's
    /// global pool when called from outside any pool.
    ///
    /// # Errors
    /// See [`invoke`](Self::invoke).
    pub fn compute(self) -> Result<ValueStore<C>, ExecutionError> {
        self.compute_with_stats().map(|report| report.values)
    }

    /// Same as [`compute`](Self::compute), also returning execution counters.
    ///
    /// # Errors
    /// See [`invoke`](Self::invoke).
    pub fn compute_with_stats(self) -> Result<ExecutionReport<C>, ExecutionError> {
        self.run(Scheduler::Current)
    }

    fn run(self, scheduler: Scheduler<'_>) -> Result<ExecutionReport<C>, ExecutionError> {
        let Self { graph, context } = self;
        debug!(%graph, "starting to execute processor graph");
        let tasks = graph
            .roots()
            .iter()
            .filter_map(|root| root.create_scheduled_task(&context, scheduler))
            .collect();
        fork_join(tasks);
        let result = context.finish();
        debug!(succeeded = result.is_ok(), "finished executing processor graph");
        result
    }
}
