use crate::{config::Config, processor::Processor};
use indexmap::{IndexMap as _IndexMap, IndexSet as _IndexSet};
use rustc_hash::FxBuildHasher;
use std::{collections::HashMap as _HashMap, sync::Arc};

/// Name of an attribute in the [`ValueStore`](crate::store::ValueStore).
pub type AttributeName = String;
/// Error type returned by processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
/// Value type bound to a specific `Config`.
pub type Value<C> = <C as Config>::Value;
/// A processor shared between the graph and its callers.
pub type SharedProcessor<C> = Arc<dyn Processor<C>>;
/// Values produced by a processor, keyed by its internal output names.
pub type ProcessorOutputs<C> = IndexMap<AttributeName, Value<C>>;

/// `HashMap` type with fast hasher.
pub type HashMap<K, V> = _HashMap<K, V, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
/// `IndexSet` type with fast hasher.
pub type IndexSet<T> = _IndexSet<T, FxBuildHasher>;

/// Identity of a processor instance.
///
/// Two processors compare equal only if they are the same allocation, no
/// matter how they are configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ProcessorKey(usize);

impl ProcessorKey {
    /// Key of the allocation behind `processor`.
    #[must_use]
    pub fn of<C: Config>(processor: &SharedProcessor<C>) -> Self {
        Self(Arc::as_ptr(processor).cast::<()>() as usize)
    }
}
