use crate::{
    config::Config,
    context::ExecutionContext,
    error::ExecutionError,
    graph::{NodeTask, Scheduler},
    processor::{ProcessorInputs, ProcessorSet},
    types::{AttributeName, IndexMap, SharedProcessor},
};
use core::fmt;
use derive_more::Debug;
use rustc_hash::FxBuildHasher;
use std::{sync::Arc, time::Instant};
use tracing::{debug, trace};

/// A processor together with the nodes that consume its outputs.
///
/// Nodes are built once by [`ProcessorDependencyGraph::setup`](crate::graph::ProcessorDependencyGraph::setup)
/// and never change afterwards. Per-execution state (arrival counters, values)
/// lives in the [`ExecutionContext`].
#[must_use]
#[derive(Debug)]
pub struct ProcessorNode<C: Config> {
    /// Dense index of the node within its graph.
    index: usize,
    processor: SharedProcessor<C>,
    /// External (store) name -> internal (processor) name.
    input_mapper: IndexMap<AttributeName, AttributeName>,
    /// Internal (processor) name -> external (store) name.
    output_mapper: IndexMap<AttributeName, AttributeName>,
    /// Number of distinct nodes producing one of this node's inputs.
    parents_total: usize,
    /// Nodes reading at least one of this node's outputs, in declaration order.
    #[debug(skip)]
    children: Vec<Arc<ProcessorNode<C>>>,
}

impl<C: Config> ProcessorNode<C> {
    pub(crate) fn new(
        index: usize,
        processor: SharedProcessor<C>,
        input_mapper: IndexMap<AttributeName, AttributeName>,
        output_mapper: IndexMap<AttributeName, AttributeName>,
        parents_total: usize,
        children: Vec<Arc<ProcessorNode<C>>>,
    ) -> Self {
        Self {
            index,
            processor,
            input_mapper,
            output_mapper,
            parents_total,
            children,
        }
    }

    /// The wrapped processor.
    #[must_use]
    pub fn processor(&self) -> &SharedProcessor<C> {
        &self.processor
    }

    /// Mapping from store names to the processor's input names. Its keys are
    /// the attributes this node reads from the store.
    #[must_use]
    pub fn input_mapper(&self) -> &IndexMap<AttributeName, AttributeName> {
        &self.input_mapper
    }

    /// Mapping from the processor's output names to store names.
    #[must_use]
    pub fn output_mapper(&self) -> &IndexMap<AttributeName, AttributeName> {
        &self.output_mapper
    }

    /// Nodes that depend on this node's outputs.
    #[must_use]
    pub fn children(&self) -> &[Arc<ProcessorNode<C>>] {
        &self.children
    }

    /// Number of nodes this node depends on.
    #[must_use]
    pub fn parents_total(&self) -> usize {
        self.parents_total
    }

    /// Whether no other node produces one of this node's inputs.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents_total == 0
    }

    /// This node's processor and the processors of all its descendants.
    #[must_use]
    pub fn all_processors(&self) -> ProcessorSet<C> {
        let mut all = ProcessorSet::default();
        self.collect_processors(&mut all);
        all
    }

    pub(crate) fn collect_processors(&self, all: &mut ProcessorSet<C>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            // A node already present has had its whole subtree collected.
            if all.insert(&node.processor) {
                stack.extend(node.children.iter().rev().map(Arc::as_ref));
            }
        }
    }

    /// Create the task running this node within `context`.
    ///
    /// Returns `None` if the node must not run: the execution has been
    /// cancelled or the processor is disabled for the current values.
    /// Callers treat `None` as "nothing to do".
    pub fn create_task<'a>(&'a self, context: &'a ExecutionContext<C>) -> Option<NodeTask<'a, C>> {
        self.create_scheduled_task(context, Scheduler::Current)
    }

    pub(crate) fn create_scheduled_task<'a>(
        &'a self,
        context: &'a ExecutionContext<C>,
        scheduler: Scheduler<'a>,
    ) -> Option<NodeTask<'a, C>> {
        if context.is_cancelled() {
            trace!(processor = self.processor.name(), "execution cancelled, not scheduling");
            context.record_interrupted();
            return None;
        }
        if !self.processor.is_enabled(context.values()) {
            debug!(processor = self.processor.name(), "processor disabled, skipping");
            context.record_skipped();
            return None;
        }
        Some(NodeTask::new(self, context, scheduler))
    }

    /// Register the completion of one parent. Returns `true` once every parent
    /// has completed.
    pub(crate) fn arrive(&self, context: &ExecutionContext<C>) -> bool {
        if self.parents_total == 1 {
            // Sole parent: nothing to synchronize with.
            return true;
        }
        context.arrival(self.index).arrive()
    }

    /// Read the inputs, run the processor and commit its outputs.
    pub(crate) fn execute(&self, context: &ExecutionContext<C>) -> Result<(), ExecutionError> {
        let name = self.processor.name();
        let values = context.values();

        let mut inputs = IndexMap::with_capacity_and_hasher(self.input_mapper.len(), FxBuildHasher);
        for (external, internal) in &self.input_mapper {
            let value = values
                .get(external)
                .ok_or_else(|| ExecutionError::MissingInput {
                    processor: name.to_owned(),
                    attribute: external.clone(),
                })?;
            inputs.insert(internal.clone(), value);
        }

        trace!(processor = name, "executing processor");
        let started = Instant::now();
        context.record_executed();
        let mut outputs = self
            .processor
            .execute(&ProcessorInputs::new(inputs))
            .map_err(|source| ExecutionError::Processor {
                processor: name.to_owned(),
                source,
            })?;
        debug!(processor = name, elapsed = ?started.elapsed(), "processor finished");

        // Validate everything before committing anything.
        if let Some(undeclared) = outputs
            .keys()
            .find(|internal| !self.output_mapper.contains_key(*internal))
        {
            return Err(ExecutionError::UndeclaredOutput {
                processor: name.to_owned(),
                attribute: undeclared.clone(),
            });
        }
        if let Some(missing) = self
            .output_mapper
            .keys()
            .find(|internal| !outputs.contains_key(*internal))
        {
            return Err(ExecutionError::MissingOutput {
                processor: name.to_owned(),
                attribute: missing.clone(),
            });
        }
        for (internal, external) in &self.output_mapper {
            let value = outputs
                .swap_remove(internal)
                .expect("ProcessorNode::execute: [1]");
            values
                .put(external.clone(), value)
                .map_err(|source| ExecutionError::Store {
                    processor: name.to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Write this node's subtree, one line per node, indented by depth.
    pub(crate) fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let mut stack = vec![(self, indent)];
        let mut first = true;
        while let Some((node, indent)) = stack.pop() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            if indent > 0 {
                write!(f, "{:width$}+-- ", "", width = indent * 2)?;
            }
            f.write_str(node.processor.name())?;
            stack.extend(node.children.iter().rev().map(|child| (child.as_ref(), indent + 1)));
        }
        Ok(())
    }
}

impl<C: Config> Drop for ProcessorNode<C> {
    fn drop(&mut self) {
        // Unlink descendants iteratively; the default recursive drop would
        // use stack proportional to the depth of the graph.
        let mut pending = core::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Some(mut child) = Arc::into_inner(child) {
                pending.append(&mut child.children);
            }
        }
    }
}

impl<C: Config> fmt::Display for ProcessorNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
