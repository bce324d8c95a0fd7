mod execute;
mod setup;

pub(crate) use crate::graph::execute::Scheduler;
/// Schedulable units produced by the graph and its nodes.
pub use crate::graph::execute::{GraphExecutionTask, NodeTask};
/// Graph construction inputs and errors.
pub use crate::graph::setup::{GraphSetupError, ProcessorRegistration};
use crate::{
    config::Config,
    error::{ConfigurationError, Error},
    node::ProcessorNode,
    processor::ProcessorSet,
    store::ValueStore,
    types::{AttributeName, IndexSet},
};
use core::fmt;
use derive_more::Debug;
use rayon::ThreadPool;
use std::sync::Arc;

/// Dependency graph of processors.
///
/// Root nodes read only attributes supplied by the caller and may all run in
/// parallel. Any other node runs once every node producing one of its inputs
/// has completed.
///
/// The graph is immutable once built and can be shared between any number of
/// concurrent executions; each execution keeps its own state in an
/// [`ExecutionContext`](crate::context::ExecutionContext).
#[must_use]
#[derive(Debug)]
pub struct ProcessorDependencyGraph<C: Config> {
    roots: Vec<Arc<ProcessorNode<C>>>,
    /// Number of parents of each node, indexed by node index.
    parent_counts: Box<[usize]>,
    /// Attributes no processor of the graph produces, roots' inputs first.
    required_attributes: IndexSet<AttributeName>,
}

impl<C: Config> ProcessorDependencyGraph<C> {
    /// Root nodes in declaration order.
    #[must_use]
    pub fn roots(&self) -> &[Arc<ProcessorNode<C>>] {
        &self.roots
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent_counts.len()
    }

    /// Whether the graph has no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent_counts.is_empty()
    }

    /// Names of every attribute that must be in the value store when the
    /// graph is executed.
    ///
    /// These are the inputs of the root nodes, plus any input of a deeper node
    /// that no processor of the graph produces.
    #[must_use]
    pub fn all_required_attributes(&self) -> &IndexSet<AttributeName> {
        &self.required_attributes
    }

    /// Every processor of the graph, deduplicated by identity.
    #[must_use]
    pub fn all_processors(&self) -> ProcessorSet<C> {
        let mut all = ProcessorSet::default();
        for root in &self.roots {
            root.collect_processors(&mut all);
        }
        all
    }

    /// Bind the graph to `values` for one execution.
    ///
    /// Nothing runs until the returned task is invoked.
    ///
    /// # Errors
    /// If `values` lacks any attribute listed by
    /// [`all_required_attributes`](Self::all_required_attributes). The error
    /// names all of them.
    pub fn create_task(
        &self,
        values: ValueStore<C>,
    ) -> Result<GraphExecutionTask<'_, C>, ConfigurationError> {
        let missing = values.missing(&self.required_attributes);
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingAttributes { missing });
        }
        Ok(GraphExecutionTask::new(self, values))
    }

    /// Validate `values`, run the whole graph on `pool` and return the final
    /// store.
    ///
    /// # Errors
    /// See [`create_task`](Self::create_task) and
    /// [`GraphExecutionTask::invoke`].
    pub fn execute(&self, values: ValueStore<C>, pool: &ThreadPool) -> Result<ValueStore<C>, Error> {
        Ok(self.create_task(values)?.invoke(pool)?)
    }

    pub(crate) fn parent_counts(&self) -> &[usize] {
        &self.parent_counts
    }
}

impl<C: Config> fmt::Display for ProcessorDependencyGraph<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, root) in self.roots.iter().enumerate() {
            if idx != 0 {
                writeln!(f)?;
            }
            f.write_str("+ ")?;
            root.fmt_tree(f, 0)?;
        }
        Ok(())
    }
}
