use crate::{
    config::Config,
    error::ValueStoreError,
    types::{AttributeName, HashMap, Value},
};
use dashmap::{DashMap, mapref::entry::Entry};
use derive_more::Debug;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// Named slots through which processors exchange values during one execution.
///
/// Backed by a sharded concurrent map: writes to distinct attributes and reads
/// of committed attributes never lock the whole store. Every attribute is
/// written at most once; a second write is rejected instead of overwriting.
#[derive(Debug)]
pub struct ValueStore<C: Config> {
    values: DashMap<AttributeName, Arc<Value<C>>, FxBuildHasher>,
}

impl<C: Config> Default for ValueStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> ValueStore<C> {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Insert `value` under `name`.
    ///
    /// # Errors
    /// If `name` is already present.
    pub fn put(&self, name: impl Into<AttributeName>, value: Value<C>) -> Result<(), ValueStoreError> {
        self.put_shared(name, Arc::new(value))
    }

    /// Insert an already shared `value` under `name`.
    ///
    /// # Errors
    /// If `name` is already present.
    pub fn put_shared(
        &self,
        name: impl Into<AttributeName>,
        value: Arc<Value<C>>,
    ) -> Result<(), ValueStoreError> {
        match self.values.entry(name.into()) {
            Entry::Occupied(entry) => Err(ValueStoreError::AlreadyPresent(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Value stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Value<C>>> {
        self.values.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `name` has been written.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of stored attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store holds no attribute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names of every stored attribute, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<AttributeName> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }

    /// The names in `required` that are absent from the store, in the given
    /// order.
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a AttributeName>) -> Vec<AttributeName> {
        required
            .into_iter()
            .filter(|name| !self.contains_key(name))
            .cloned()
            .collect()
    }

    /// Consume the store into a plain map.
    #[must_use]
    pub fn into_map(self) -> HashMap<AttributeName, Arc<Value<C>>> {
        self.values.into_iter().collect()
    }
}

impl<C: Config, K: Into<AttributeName>> FromIterator<(K, Value<C>)> for ValueStore<C> {
    /// The first value given for a name is kept; later ones are dropped.
    fn from_iter<I: IntoIterator<Item = (K, Value<C>)>>(iter: I) -> Self {
        let store = Self::new();
        for (name, value) in iter {
            store.values.entry(name.into()).or_insert_with(|| Arc::new(value));
        }
        store
    }
}
