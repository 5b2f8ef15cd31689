use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{BackendError, CausalContext, FetchResponse, KvBackend, PutOptions};

struct Sibling {
    version: u64,
    value: Vec<u8>,
}

#[derive(Default)]
struct Namespace {
    allow_multi: bool,
    objects: HashMap<String, Vec<Sibling>>,
}

#[derive(Default)]
struct MemoryState {
    namespaces: HashMap<String, Namespace>,
    next_version: u64,
    unavailable: bool,
}

/// Single-process backend that keeps siblings the way a replicated store
/// with allow_multi would. Used for development runs and tests.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`BackendError::Unavailable`]
    /// until called again with `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Number of siblings currently stored for the key.
    pub fn sibling_count(&self, namespace: &str, key: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .namespaces
                    .get(namespace)
                    .and_then(|ns| ns.objects.get(key))
                    .map(|siblings| siblings.len())
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        let state = self
            .state
            .lock()
            .map_err(|_| BackendError::Execution("in-memory backend lock poisoned".to_string()))?;
        if state.unavailable {
            return Err(BackendError::Unavailable(
                "in-memory backend marked unavailable".to_string(),
            ));
        }
        Ok(state)
    }
}

impl KvBackend for InMemoryBackend {
    fn set_allow_multi(&self, namespace: &str, allow_multi: bool) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .allow_multi = allow_multi;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<FetchResponse, BackendError> {
        let state = self.lock()?;
        let Some(ns) = state.namespaces.get(namespace) else {
            return Ok(FetchResponse::default());
        };
        let Some(siblings) = ns.objects.get(key) else {
            return Ok(FetchResponse::default());
        };

        if !ns.allow_multi && siblings.len() > 1 {
            return Err(BackendError::UnresolvedConflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }

        Ok(FetchResponse {
            values: siblings.iter().map(|s| s.value.clone()).collect(),
            context: CausalContext::new(siblings.iter().map(|s| s.version)),
        })
    }

    fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        options: &PutOptions,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        state.next_version += 1;
        let version = state.next_version;

        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        let allow_multi = ns.allow_multi;
        let siblings = ns.objects.entry(key.to_string()).or_default();
        if allow_multi {
            siblings.retain(|s| !options.context.contains(s.version));
        } else {
            siblings.clear();
        }
        siblings.push(Sibling {
            version,
            value: value.to_vec(),
        });
        debug!(
            "Stored {}/{} version {} ({} siblings)",
            namespace,
            key,
            version,
            siblings.len()
        );
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if let Some(ns) = state.namespaces.get_mut(namespace) {
            ns.objects.remove(key);
        }
        Ok(())
    }

    fn ping(&self) -> Result<(), BackendError> {
        self.lock().map(|_| ())
    }
}
