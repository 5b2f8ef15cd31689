use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::kv::{decode_siblings, resolve_siblings, KvBackend, Mergeable, PutOptions};
use crate::metrics::{record_siblings_resolved, time_store_operation};

/// Backend namespace holding one watermark per (user, cursor).
pub const NAMESPACE: &str = "cursors";

/// Cursor tracking the newest notification a user has been shown.
pub const DEFAULT_CURSOR: &str = "notifications";

const STORE_NAME: &str = "cursor";

/// Stored watermark. Concurrent versions merge to the highest value, so a
/// cursor never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorObject {
    pub value: i64,
}

impl Default for CursorObject {
    fn default() -> Self {
        Self { value: i64::MIN }
    }
}

impl Mergeable for CursorObject {
    fn merge(&mut self, other: &Self) {
        self.value = self.value.max(other.value);
    }
}

/// Cursor names end up in storage keys: letters, digits and underscores only.
pub fn is_valid_cursor_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct CursorStore {
    backend: Arc<dyn KvBackend>,
}

impl CursorStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        debug!("Enabling allow_multi on namespace {}", NAMESPACE);
        self.backend.set_allow_multi(NAMESPACE, true)?;
        Ok(())
    }

    pub fn fetch(&self, username: &str, cursor: &str) -> Result<Option<i64>, StoreError> {
        time_store_operation(STORE_NAME, "fetch", || -> Result<_, StoreError> {
            let key = cursor_key(username, cursor);
            let response = self.backend.get(NAMESPACE, &key)?;
            if response.has_siblings() {
                record_siblings_resolved(STORE_NAME);
            }
            let siblings: Vec<CursorObject> = decode_siblings(&response.values)
                .map_err(|source| StoreError::Corrupt { key, source })?;
            Ok(resolve_siblings(siblings).map(|cursor| cursor.value))
        })
    }

    /// Moves the cursor forward to `value`. A lower value leaves the stored
    /// one in place. Returns the value now stored.
    pub fn store(&self, username: &str, cursor: &str, value: i64) -> Result<i64, StoreError> {
        time_store_operation(STORE_NAME, "store", || -> Result<_, StoreError> {
            let key = cursor_key(username, cursor);
            let response = self.backend.get(NAMESPACE, &key)?;
            let siblings: Vec<CursorObject> =
                decode_siblings(&response.values).map_err(|source| StoreError::Corrupt {
                    key: key.clone(),
                    source,
                })?;

            let mut resolved = resolve_siblings(siblings).unwrap_or_default();
            resolved.merge(&CursorObject { value });

            let encoded = serde_json::to_vec(&resolved).map_err(StoreError::Encode)?;
            self.backend.put(
                NAMESPACE,
                &key,
                &encoded,
                &PutOptions::with_context(response.context),
            )?;
            debug!("Cursor {} is now {}", key, resolved.value);
            Ok(resolved.value)
        })
    }

    pub fn delete(&self, username: &str, cursor: &str) -> Result<(), StoreError> {
        time_store_operation(STORE_NAME, "delete", || -> Result<_, StoreError> {
            let key = cursor_key(username, cursor);
            self.backend.delete(NAMESPACE, &key)?;
            debug!("Deleted cursor {}", key);
            Ok(())
        })
    }
}

fn cursor_key(username: &str, cursor: &str) -> String {
    format!("{}-{}", username, cursor)
}
