use crate::{
    config::Config,
    store::ValueStore,
    types::{AttributeName, BoxError, IndexMap, ProcessorKey, ProcessorOutputs, SharedProcessor, Value},
};
use derive_more::{Debug, Deref};
use std::sync::Arc;

/// A single unit of computation in the graph.
///
/// A processor declares the attribute names it reads and writes; the graph
/// wires producers to consumers by matching those names. `execute` is called
/// at most once per graph execution, after every processor producing one of
/// its inputs has committed its outputs.
///
/// Processors are compared by identity only. Two instances configured the same
/// way are still two distinct nodes of the graph.
pub trait Processor<C: Config>: core::fmt::Debug + Send + Sync {
    /// Human-readable name used in diagnostics and errors.
    fn name(&self) -> &str;

    /// Internal names of the inputs read by `execute`.
    fn input_names(&self) -> Vec<AttributeName>;

    /// Internal names of the outputs returned by `execute`.
    fn output_names(&self) -> Vec<AttributeName>;

    /// Whether the processor should run for this execution.
    ///
    /// A disabled processor is skipped together with every processor that
    /// depends on one of its outputs.
    fn is_enabled(&self, values: &ValueStore<C>) -> bool {
        let _ = values;
        true
    }

    /// Compute the outputs from the inputs.
    ///
    /// The returned map must contain exactly the names listed by
    /// `output_names`.
    ///
    /// # Errors
    /// Any error aborts the whole graph execution.
    fn execute(&self, inputs: &ProcessorInputs<C>) -> Result<ProcessorOutputs<C>, BoxError>;
}

/// Inputs handed to [`Processor::execute`], keyed by internal name.
#[derive(Debug, Deref)]
pub struct ProcessorInputs<C: Config>(IndexMap<AttributeName, Arc<Value<C>>>);

impl<C: Config> ProcessorInputs<C> {
    pub(crate) fn new(inputs: IndexMap<AttributeName, Arc<Value<C>>>) -> Self {
        Self(inputs)
    }

    /// The input named `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value<C>> {
        self.0.get(name).map(Arc::as_ref)
    }
}

/// Set of processors deduplicated by identity, in insertion order.
#[derive(Debug)]
pub struct ProcessorSet<C: Config> {
    processors: IndexMap<ProcessorKey, SharedProcessor<C>>,
}

impl<C: Config> Default for ProcessorSet<C> {
    fn default() -> Self {
        Self {
            processors: IndexMap::default(),
        }
    }
}

impl<C: Config> ProcessorSet<C> {
    /// Add `processor`. Returns `false` if this very instance was already
    /// present.
    pub fn insert(&mut self, processor: &SharedProcessor<C>) -> bool {
        self.processors
            .insert(ProcessorKey::of(processor), Arc::clone(processor))
            .is_none()
    }

    /// Whether this very instance is present.
    #[must_use]
    pub fn contains(&self, processor: &SharedProcessor<C>) -> bool {
        self.processors.contains_key(&ProcessorKey::of(processor))
    }

    /// Number of distinct instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Processors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedProcessor<C>> {
        self.processors.values()
    }
}

impl<C: Config> IntoIterator for ProcessorSet<C> {
    type Item = SharedProcessor<C>;
    type IntoIter = indexmap::map::IntoValues<ProcessorKey, SharedProcessor<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.processors.into_values()
    }
}
