use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::feed::NotificationFeed;
use super::id_generator::{timestamp_millis, IdGenerator};
use super::models::Notification;
use super::range::{self, Page};
use crate::error::StoreError;
use crate::kv::{decode_siblings, resolve_siblings, CausalContext, KvBackend, PutOptions};
use crate::metrics::{record_siblings_resolved, time_store_operation};

/// Backend namespace holding one feed per user.
pub const NAMESPACE: &str = "notifications";

const STORE_NAME: &str = "notification";

/// Reads and writes user feeds, reconciling siblings on every read.
///
/// Every mutation is a read-modify-write that passes the read's causal
/// context back to the backend, so concurrent writers produce siblings
/// instead of overwriting each other.
pub struct NotificationStore {
    backend: Arc<dyn KvBackend>,
    id_generator: IdGenerator,
}

impl NotificationStore {
    pub fn new(backend: Arc<dyn KvBackend>, id_generator: IdGenerator) -> Self {
        Self {
            backend,
            id_generator,
        }
    }

    /// Turns on sibling surfacing for the feed namespace.
    pub fn initialize(&self) -> Result<(), StoreError> {
        debug!("Enabling allow_multi on namespace {}", NAMESPACE);
        self.backend.set_allow_multi(NAMESPACE, true)?;
        Ok(())
    }

    /// Returns the user's resolved feed, or `None` if the user never had one.
    pub fn fetch(&self, username: &str) -> Result<Option<NotificationFeed>, StoreError> {
        time_store_operation(STORE_NAME, "fetch", || -> Result<_, StoreError> {
            Ok(self.read(username)?.map(|(feed, _)| feed))
        })
    }

    /// Assigns an identity (and a creation time when missing) and appends the
    /// notification to the user's feed. Returns the stored notification.
    pub fn store(
        &self,
        username: &str,
        notification: Notification,
    ) -> Result<Notification, StoreError> {
        time_store_operation(STORE_NAME, "store", || -> Result<_, StoreError> {
            let mut notification = notification;
            let id = self.id_generator.next_id()?;
            notification.id = Some(id);
            if notification.created_at.is_none() {
                let created_at = DateTime::from_timestamp_millis(timestamp_millis(id));
                notification.created_at = created_at.or_else(|| Some(Utc::now()));
            }

            let (mut feed, context) = self
                .read(username)?
                .unwrap_or_else(|| (NotificationFeed::new(username), CausalContext::default()));
            if !feed.add(notification.clone()) {
                warn!("Notification {} for {} was not kept in the feed", id, username);
                return Err(StoreError::Rejected {
                    key: username.to_string(),
                    id,
                });
            }
            self.write(&feed, context)?;

            debug!("Stored notification {:?} for {}", notification.id, username);
            Ok(notification)
        })
    }

    /// Tombstones the given identities. A user without a feed is left alone,
    /// and identities above anything issued so far are ignored.
    pub fn remove(&self, username: &str, ids: &[i64]) -> Result<(), StoreError> {
        time_store_operation(STORE_NAME, "remove", || -> Result<_, StoreError> {
            let max_issued = self.id_generator.max_issued_id()?;
            let (ids, never_issued): (Vec<i64>, Vec<i64>) =
                ids.iter().partition(|id| **id <= max_issued);
            if !never_issued.is_empty() {
                debug!(
                    "Ignoring {} never issued ids for {}",
                    never_issued.len(),
                    username
                );
            }

            let Some((mut feed, context)) = self.read(username)? else {
                debug!("No feed for {}, nothing to remove", username);
                return Ok(());
            };
            let tombstoned = ids.iter().filter(|id| feed.delete(**id)).count();
            self.write(&feed, context)?;
            debug!("Removed {} notifications for {}", tombstoned, username);
            Ok(())
        })
    }

    /// Tombstones every live notification. The feed itself stays, so a
    /// subsequent fetch returns an empty feed rather than nothing.
    pub fn remove_all(&self, username: &str) -> Result<(), StoreError> {
        time_store_operation(STORE_NAME, "remove_all", || -> Result<_, StoreError> {
            let Some((mut feed, context)) = self.read(username)? else {
                debug!("No feed for {}, nothing to remove", username);
                return Ok(());
            };
            let removed = feed.delete_all();
            self.write(&feed, context)?;
            debug!("Removed all {} notifications for {}", removed, username);
            Ok(())
        })
    }

    /// Paging primitive over a descending list of notifications.
    pub fn skip(notifications: &[Notification], start_id: i64, inclusive: bool, max: usize) -> Page {
        range::skip(notifications, start_id, inclusive, max)
    }

    fn read(&self, username: &str) -> Result<Option<(NotificationFeed, CausalContext)>, StoreError> {
        let response = self.backend.get(NAMESPACE, username)?;
        if response.has_siblings() {
            debug!(
                "Resolving {} siblings for {}",
                response.values.len(),
                username
            );
            record_siblings_resolved(STORE_NAME);
        }

        let siblings: Vec<NotificationFeed> =
            decode_siblings(&response.values).map_err(|source| StoreError::Corrupt {
                key: username.to_string(),
                source,
            })?;

        Ok(resolve_siblings(siblings).map(|mut feed| {
            feed.set_key(username);
            (feed, response.context)
        }))
    }

    fn write(&self, feed: &NotificationFeed, context: CausalContext) -> Result<(), StoreError> {
        let value = serde_json::to_vec(feed).map_err(StoreError::Encode)?;
        self.backend
            .put(NAMESPACE, feed.key(), &value, &PutOptions::with_context(context))?;
        Ok(())
    }
}
