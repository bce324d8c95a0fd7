//! Fork/join executor for dependency graphs of processors.
//!
//! A processor declares the names of the attributes it reads and writes. This
//! crate:
//! - Builds a dependency graph by matching output names to input names,
//!   rejecting cycles and attributes written by more than one processor.
//! - Checks, before anything runs, that the caller supplied every attribute
//!   the graph cannot produce itself.
//! - Runs independent branches in parallel on a rayon pool. The calling thread
//!   runs the first branch itself, the other branches are forked, and the
//!   call returns once all of them are joined.
//! - Releases a node with several parents only when the last of them has
//!   completed, using a per-execution atomic arrival counter rather than a
//!   blocking wait.
//!
//! Key modules:
//! - `config`: binds the value type via the `Config` trait and describes the
//!   worker pool.
//! - `processor`: the `Processor` interface and identity-keyed processor sets.
//! - `graph`: graph setup (validation, topological ordering) and execution
//!   tasks.
//! - `node`: a processor with its resolved children.
//! - `store` and `context`: the per-execution state.
//!
//! Quick start:
//! 1. Implement `Config` with your value type.
//! 2. Implement `Processor` for each processing step.
//! 3. Call `ProcessorDependencyGraph::setup` once, then for each request fill
//!    a `ValueStore`, call `create_task` and `invoke` the task on a pool.
//!
//! Every processor observes, in the store, all outputs of the processors it
//! depends on. Branches without a data dependency between them are not
//! ordered.

/// Public interface to configure the graph.
///
/// Exposes the `Config` trait, which binds the value type exchanged by
/// processors, and the `PoolConfig` used to build the worker pool.
pub mod config;
/// Per-execution state: arrival counters, cancellation, first failure and
/// counters.
pub mod context;
/// Errors reported while validating or executing a graph.
pub mod error;
/// The processor dependency graph.
///
/// Contains graph setup (name matching, cycle detection, topological
/// ordering) and the fork/join execution tasks.
pub mod graph;
/// Arrival counter releasing a node once all its parents have completed.
pub mod latch;
/// Graph nodes: a processor, its name mappings and its children.
pub mod node;
/// The `Processor` trait and the values passed to and from it.
pub mod processor;
/// The concurrent, insert-once value store shared by one execution.
pub mod store;
mod sync;
/// Core types used across the crate (attribute names, identity keys, maps
/// with a fast hasher).
pub mod types;
