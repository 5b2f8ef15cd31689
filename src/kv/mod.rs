//! Replicated key-value backend contract.
//!
//! The backend is allowed to hand back more than one version ("sibling") of a
//! value when concurrent writes were not resolved server side. Writers pass the
//! [`CausalContext`] they read so that the siblings they observed are superseded
//! by their write, while siblings written concurrently survive.

mod error;
mod memory;
mod schema;
mod siblings;
mod sqlite_backend;

pub use error::BackendError;
pub use memory::InMemoryBackend;
pub use schema::KV_VERSIONED_SCHEMAS;
pub use siblings::{decode_siblings, resolve_siblings, Mergeable};
pub use sqlite_backend::SqliteBackend;

use std::collections::BTreeSet;

/// Versions of the siblings observed by a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CausalContext(BTreeSet<u64>);

impl CausalContext {
    pub fn new(versions: impl IntoIterator<Item = u64>) -> Self {
        Self(versions.into_iter().collect())
    }

    pub fn versions(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, version: u64) -> bool {
        self.0.contains(&version)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of a read: zero, one or many sibling values plus their context.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub values: Vec<Vec<u8>>,
    pub context: CausalContext,
}

impl FetchResponse {
    pub fn is_not_found(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_siblings(&self) -> bool {
        self.values.len() > 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Siblings to supersede. An empty context adds a new sibling when the
    /// namespace allows multiple values.
    pub context: CausalContext,
}

impl PutOptions {
    pub fn with_context(context: CausalContext) -> Self {
        Self { context }
    }
}

pub trait KvBackend: Send + Sync {
    /// Enables or disables sibling surfacing for a namespace. With
    /// `allow_multi` disabled every put replaces all existing versions.
    fn set_allow_multi(&self, namespace: &str, allow_multi: bool) -> Result<(), BackendError>;

    /// Reads every sibling stored under the key.
    /// Returns an empty response if the key does not exist.
    fn get(&self, namespace: &str, key: &str) -> Result<FetchResponse, BackendError>;

    /// Writes a new version of the key, superseding the siblings named in the
    /// options' context.
    fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        options: &PutOptions,
    ) -> Result<(), BackendError>;

    /// Removes the key and all its siblings.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError>;

    /// Checks whether the backend is reachable.
    fn ping(&self) -> Result<(), BackendError>;
}
