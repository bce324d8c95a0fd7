use crate::{
    graph::GraphSetupError,
    types::{AttributeName, BoxError},
};
use thiserror::Error;

/// Error returned by [`ProcessorDependencyGraph::create_task`](crate::graph::ProcessorDependencyGraph::create_task)
/// when the caller's store is incomplete. No processor has run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The value store lacks attributes the graph requires from the caller.
    #[error("the following attributes are not in the value store: {missing:?}")]
    MissingAttributes {
        /// Every missing attribute, in the order of `all_required_attributes`.
        missing: Vec<AttributeName>,
    },
}

/// Error returned when writing an already present attribute.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueStoreError {
    /// The attribute has already been written during this execution.
    #[error("attribute `{0}` is already present in the value store")]
    AlreadyPresent(AttributeName),
}

/// Terminal failure of one graph execution.
///
/// When several branches fail concurrently, the failure recorded first is
/// reported and the others are logged and dropped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// A processor returned an error.
    #[error("processor `{processor}` failed")]
    Processor {
        /// Name of the failed processor.
        processor: String,
        /// Error returned by the processor.
        #[source]
        source: BoxError,
    },
    /// An input of a processor was absent from the store when it started.
    #[error("processor `{processor}` requires attribute `{attribute}` which is not in the value store")]
    MissingInput {
        /// Name of the processor.
        processor: String,
        /// External name of the missing input.
        attribute: AttributeName,
    },
    /// A processor did not return one of its declared outputs.
    #[error("processor `{processor}` did not produce its declared output `{attribute}`")]
    MissingOutput {
        /// Name of the processor.
        processor: String,
        /// Internal name of the missing output.
        attribute: AttributeName,
    },
    /// A processor returned an output it did not declare.
    #[error("processor `{processor}` produced undeclared output `{attribute}`")]
    UndeclaredOutput {
        /// Name of the processor.
        processor: String,
        /// Internal name of the unexpected output.
        attribute: AttributeName,
    },
    /// Committing an output would overwrite an existing attribute.
    #[error("processor `{processor}` could not commit its outputs")]
    Store {
        /// Name of the processor.
        processor: String,
        /// Store rejection.
        #[source]
        source: ValueStoreError,
    },
    /// Cancellation kept at least one processor from running.
    #[error("graph execution was cancelled")]
    Cancelled,
}

/// Any failure of a one-shot graph execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The graph could not be built.
    #[error(transparent)]
    Setup(#[from] GraphSetupError),
    /// The value store is incomplete.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The execution failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
