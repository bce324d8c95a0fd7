use crate::{
    config::Config,
    graph::ProcessorDependencyGraph,
    node::ProcessorNode,
    types::{AttributeName, IndexMap, IndexSet, SharedProcessor},
};
use derive_more::Debug;
use rustc_hash::FxBuildHasher;
use std::{collections::VecDeque, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Error returned by [`ProcessorDependencyGraph::setup`] when the processors
/// cannot form a valid graph. Nothing has been executed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphSetupError {
    /// The processors' inputs and outputs form cycle(s).
    #[error("processors {processors:?} are part of or depend on a dependency cycle")]
    Cycle {
        /// Names of every processor that could not be ordered.
        processors: Vec<String>,
    },
    /// Two processors write the same attribute.
    #[error("attribute `{attribute}` is produced by both `{first}` and `{second}`")]
    DuplicateOutput {
        /// External name of the attribute.
        attribute: AttributeName,
        /// Processor declared first.
        first: String,
        /// Processor declared second.
        second: String,
    },
    /// A name mapping refers to an input or output the processor doesn't
    /// declare.
    #[error("processor `{processor}` has a mapping for undeclared attribute `{attribute}`")]
    UnknownMapping {
        /// Name of the processor.
        processor: String,
        /// Internal name used in the mapping.
        attribute: AttributeName,
    },
    /// One store attribute is mapped to several inputs of a processor.
    #[error("processor `{processor}` reads attribute `{attribute}` into more than one input")]
    AmbiguousInputMapping {
        /// Name of the processor.
        processor: String,
        /// External name of the attribute.
        attribute: AttributeName,
    },
}

/// A processor to add to a graph, with optional renaming of its attributes.
///
/// By default each input is read from the store attribute of the same name and
/// each output is written under its own name.
#[must_use]
#[derive(Debug)]
pub struct ProcessorRegistration<C: Config> {
    processor: SharedProcessor<C>,
    /// Internal input name -> store name.
    inputs: IndexMap<AttributeName, AttributeName>,
    /// Internal output name -> store name.
    outputs: IndexMap<AttributeName, AttributeName>,
}

impl<C: Config> From<SharedProcessor<C>> for ProcessorRegistration<C> {
    fn from(processor: SharedProcessor<C>) -> Self {
        Self::new(processor)
    }
}

impl<C: Config> ProcessorRegistration<C> {
    /// Register `processor` with identity name mappings.
    pub fn new(processor: SharedProcessor<C>) -> Self {
        Self {
            processor,
            inputs: IndexMap::default(),
            outputs: IndexMap::default(),
        }
    }

    /// Read the processor input `internal` from the store attribute `external`.
    pub fn map_input(mut self, internal: impl Into<AttributeName>, external: impl Into<AttributeName>) -> Self {
        self.inputs.insert(internal.into(), external.into());
        self
    }

    /// Write the processor output `internal` to the store attribute `external`.
    pub fn map_output(mut self, internal: impl Into<AttributeName>, external: impl Into<AttributeName>) -> Self {
        self.outputs.insert(internal.into(), external.into());
        self
    }

    fn resolve(self) -> Result<ResolvedRegistration<C>, GraphSetupError> {
        let Self {
            processor,
            inputs,
            outputs,
        } = self;
        let input_names = processor.input_names();
        let output_names = processor.output_names();
        let unknown = inputs
            .keys()
            .find(|internal| !input_names.contains(internal))
            .or_else(|| outputs.keys().find(|internal| !output_names.contains(internal)));
        if let Some(attribute) = unknown {
            return Err(GraphSetupError::UnknownMapping {
                processor: processor.name().to_owned(),
                attribute: attribute.clone(),
            });
        }

        let mut input_mapper = IndexMap::with_capacity_and_hasher(input_names.len(), FxBuildHasher);
        for internal in input_names {
            let external = inputs.get(&internal).unwrap_or(&internal).clone();
            if input_mapper.contains_key(&external) {
                return Err(GraphSetupError::AmbiguousInputMapping {
                    processor: processor.name().to_owned(),
                    attribute: external,
                });
            }
            input_mapper.insert(external, internal);
        }

        let output_mapper = output_names
            .into_iter()
            .map(|internal| {
                let external = outputs.get(&internal).unwrap_or(&internal).clone();
                (internal, external)
            })
            .collect();

        Ok(ResolvedRegistration {
            processor,
            input_mapper,
            output_mapper,
        })
    }
}

fn name_of<C: Config>(resolved: &[Option<ResolvedRegistration<C>>], idx: usize) -> String {
    resolved[idx]
        .as_ref()
        .expect("ProcessorDependencyGraph::setup: [1]")
        .processor
        .name()
        .to_owned()
}

struct ResolvedRegistration<C: Config> {
    processor: SharedProcessor<C>,
    /// Store name -> internal name.
    input_mapper: IndexMap<AttributeName, AttributeName>,
    /// Internal name -> store name.
    output_mapper: IndexMap<AttributeName, AttributeName>,
}

impl<C: Config> ProcessorDependencyGraph<C> {
    /// Build the graph by matching the processors' output names to their
    /// input names.
    ///
    /// A processor whose inputs are all supplied by the caller becomes a root.
    /// Roots and children keep the order in which processors are given.
    ///
    /// # Panics
    /// In case of internal invariant violations. Impossible if there are no
    /// bugs in the code.
    ///
    /// # Errors
    /// If two processors write the same attribute, if a name mapping is
    /// invalid, or if the processors depend on each other cyclically.
    pub fn setup<R>(registrations: impl IntoIterator<Item = R>) -> Result<Self, GraphSetupError>
    where
        R: Into<ProcessorRegistration<C>>,
    {
        // Example:
        //
        //   A(in: x -> out: a)   B(in: y -> out: b)
        //              \          /
        //          C(in: a, b -> out: c)
        //                  |
        //          D(in: c, z -> out: d)
        //
        // - Roots: A, B (their inputs x, y come from the caller).
        // - C has two parents and is released by whichever of A, B completes
        //   last. D has a single parent and runs right after C.
        // - Required attributes: x, y (roots), then z (read by D, produced by
        //   nobody).
        //
        // Phase 1: Resolve the name mappings of every processor.
        let mut resolved = registrations
            .into_iter()
            .map(|registration| Into::<ProcessorRegistration<C>>::into(registration).resolve().map(Some))
            .collect::<Result<Vec<_>, _>>()?;
        let num_nodes = resolved.len();

        // Phase 2: Find the unique producer of each attribute.
        let mut producers = IndexMap::with_capacity_and_hasher(num_nodes, FxBuildHasher);
        for (idx, registration) in resolved.iter().enumerate() {
            let registration = registration.as_ref().expect("ProcessorDependencyGraph::setup: [2]");
            for external in registration.output_mapper.values() {
                if let Some(&first) = producers.get(external) {
                    return Err(GraphSetupError::DuplicateOutput {
                        attribute: external.clone(),
                        first: name_of(&resolved, first),
                        second: registration.processor.name().to_owned(),
                    });
                }
                producers.insert(external.clone(), idx);
            }
        }

        // Phase 3: Link every consumer to the producers of its inputs.
        let mut child_to_parents: Vec<IndexSet<usize>> = vec![IndexSet::default(); num_nodes];
        let mut parent_to_children: Vec<IndexSet<usize>> = vec![IndexSet::default(); num_nodes];
        for (idx, registration) in resolved.iter().enumerate() {
            let registration = registration.as_ref().expect("ProcessorDependencyGraph::setup: [3]");
            for external in registration.input_mapper.keys() {
                let Some(&parent) = producers.get(external) else {
                    continue;
                };
                if parent == idx {
                    return Err(GraphSetupError::Cycle {
                        processors: vec![registration.processor.name().to_owned()],
                    });
                }
                child_to_parents[idx].insert(parent);
                parent_to_children[parent].insert(idx);
            }
        }

        // Phase 4: Kahn's algorithm. Nodes left with unresolved parents once
        // the queue drains are on, or downstream of, a cycle.
        let mut parents_left: Vec<usize> = child_to_parents.iter().map(IndexSet::len).collect();
        let mut queue: VecDeque<usize> = (0..num_nodes).filter(|&idx| parents_left[idx] == 0).collect();
        let num_roots = queue.len();
        let mut order = Vec::with_capacity(num_nodes);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for &child in &parent_to_children[idx] {
                parents_left[child] = parents_left[child]
                    .checked_sub(1)
                    .expect("ProcessorDependencyGraph::setup: [4]");
                if parents_left[child] == 0 {
                    queue.push_back(child);
                }
            }
        }
        if order.len() != num_nodes {
            return Err(GraphSetupError::Cycle {
                processors: (0..num_nodes)
                    .filter(|&idx| parents_left[idx] != 0)
                    .map(|idx| name_of(&resolved, idx))
                    .collect(),
            });
        }

        // Phase 5: Collect the attributes the caller has to supply, roots first.
        let (root_order, inner_order) = order.split_at(num_roots);
        let mut required_attributes = IndexSet::default();
        for &idx in root_order.iter().chain(inner_order) {
            let registration = resolved[idx].as_ref().expect("ProcessorDependencyGraph::setup: [5]");
            required_attributes.extend(
                registration
                    .input_mapper
                    .keys()
                    .filter(|external| !producers.contains_key(*external))
                    .cloned(),
            );
        }

        // Phase 6: Materialize nodes from the leaves up, so that every child
        // exists before its parents.
        let mut nodes: Vec<Option<Arc<ProcessorNode<C>>>> = vec![None; num_nodes];
        for &idx in order.iter().rev() {
            let children = parent_to_children[idx]
                .iter()
                .map(|&child| nodes[child].clone().expect("ProcessorDependencyGraph::setup: [6]"))
                .collect();
            let ResolvedRegistration {
                processor,
                input_mapper,
                output_mapper,
            } = resolved[idx].take().expect("ProcessorDependencyGraph::setup: [7]");
            nodes[idx] = Some(Arc::new(ProcessorNode::new(
                idx,
                processor,
                input_mapper,
                output_mapper,
                child_to_parents[idx].len(),
                children,
            )));
        }
        let roots: Vec<_> = root_order
            .iter()
            .map(|&idx| nodes[idx].clone().expect("ProcessorDependencyGraph::setup: [8]"))
            .collect();

        debug!(
            processors = num_nodes,
            roots = roots.len(),
            required_attributes = required_attributes.len(),
            "processor dependency graph built"
        );
        Ok(Self {
            roots,
            parent_counts: child_to_parents.iter().map(IndexSet::len).collect(),
            required_attributes,
        })
    }
}
