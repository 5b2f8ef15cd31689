//! Per-user feed aggregate and its replica merge.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::Notification;
use crate::kv::Mergeable;

/// Maximum number of live notifications kept per user.
pub const MAX_NOTIFICATIONS: usize = 1000;

/// Maximum number of delete markers kept per user. Older markers are folded
/// into the feed's floor, which never rises to a live identity.
pub const MAX_DELETED_IDS: usize = 1000;

/// The bounded, deduplicated feed of one user.
///
/// Live records are keyed by identity. Deleted identities are remembered as
/// tombstones so that a stale replica cannot bring them back. Identities that
/// leave the feed without a tombstone (capacity eviction, tombstone overflow)
/// raise `floor`: nothing at or below the floor is ever admitted again.
///
/// The floor always stays below the lowest live identity, so tombstones
/// alone never evict a live record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredFeed", into = "StoredFeed")]
pub struct NotificationFeed {
    key: String,
    notifications: BTreeMap<i64, Notification>,
    deleted_ids: BTreeSet<i64>,
    floor: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct StoredFeed {
    #[serde(default)]
    notifications: Vec<Notification>,
    #[serde(default)]
    deleted_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    floor: Option<i64>,
}

impl From<StoredFeed> for NotificationFeed {
    fn from(stored: StoredFeed) -> Self {
        let mut feed = NotificationFeed {
            deleted_ids: stored.deleted_ids.into_iter().collect(),
            floor: stored.floor,
            ..Default::default()
        };
        for notification in stored.notifications {
            if let Some(id) = notification.id {
                feed.notifications.insert(id, notification);
            }
        }
        feed.normalize();
        feed
    }
}

impl From<NotificationFeed> for StoredFeed {
    fn from(feed: NotificationFeed) -> Self {
        StoredFeed {
            notifications: feed.notifications.into_values().rev().collect(),
            deleted_ids: feed.deleted_ids.into_iter().collect(),
            floor: feed.floor,
        }
    }
}

impl NotificationFeed {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// The user this feed belongs to. Not persisted with the value.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.notifications.contains_key(&id)
    }

    pub fn is_deleted(&self, id: i64) -> bool {
        self.deleted_ids.contains(&id) || self.is_sealed(id)
    }

    pub fn floor(&self) -> Option<i64> {
        self.floor
    }

    /// Highest live identity.
    pub fn first_id(&self) -> Option<i64> {
        self.notifications.keys().next_back().copied()
    }

    /// Lowest live identity.
    pub fn last_id(&self) -> Option<i64> {
        self.notifications.keys().next().copied()
    }

    /// Live notifications, highest identity first.
    pub fn notifications(&self) -> impl DoubleEndedIterator<Item = &Notification> {
        self.notifications.values().rev()
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.notifications().cloned().collect()
    }

    /// Tombstoned identities, lowest first.
    pub fn deleted_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.deleted_ids.iter().copied()
    }

    /// Inserts or replaces a notification by identity. Returns whether the
    /// notification is live afterwards: records without an identity, with a
    /// tombstoned identity or below the floor are rejected, and a record
    /// older than a full feed is evicted right away.
    pub fn add(&mut self, notification: Notification) -> bool {
        let Some(id) = self.admit(notification) else {
            return false;
        };
        self.trim();
        self.contains(id)
    }

    /// Same as repeated [`add`](Self::add), trimming once at the end.
    /// Returns how many of the given notifications are live afterwards.
    pub fn add_all(&mut self, notifications: impl IntoIterator<Item = Notification>) -> usize {
        let admitted: Vec<i64> = notifications
            .into_iter()
            .filter_map(|n| self.admit(n))
            .collect();
        self.trim();
        admitted
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| self.contains(*id))
            .count()
    }

    /// Tombstones an identity. Idempotent. Returns whether a tombstone is
    /// kept for it.
    ///
    /// An identity that is not live and sits below every live record has
    /// either left the feed already or never existed, so it gets no tombstone.
    pub fn delete(&mut self, id: i64) -> bool {
        if self.is_sealed(id) {
            return false;
        }
        let was_live = self.notifications.remove(&id).is_some();
        if !was_live && self.last_id().is_some_and(|lowest| id < lowest) {
            debug!("Skipping tombstone for unknown notification {} of {}", id, self.key);
            return false;
        }
        self.deleted_ids.insert(id);
        self.trim();
        self.deleted_ids.contains(&id)
    }

    /// Tombstones every live identity. Returns how many were live.
    pub fn delete_all(&mut self) -> usize {
        let live = std::mem::take(&mut self.notifications);
        let count = live.len();
        self.deleted_ids.extend(live.into_keys());
        self.trim();
        count
    }

    fn admit(&mut self, notification: Notification) -> Option<i64> {
        let id = notification.id?;
        if self.is_deleted(id) {
            debug!("Rejecting deleted notification {} for {}", id, self.key);
            return None;
        }
        self.notifications.insert(id, notification);
        Some(id)
    }

    fn is_sealed(&self, id: i64) -> bool {
        self.floor.is_some_and(|floor| id <= floor)
    }

    fn raise_floor(&mut self, id: i64) {
        self.floor = Some(self.floor.map_or(id, |floor| floor.max(id)));
    }

    /// Applies tombstones to the live set, then the size bounds.
    fn normalize(&mut self) {
        let deleted_ids = &self.deleted_ids;
        self.notifications.retain(|id, _| !deleted_ids.contains(id));
        self.trim();
    }

    fn trim(&mut self) {
        while self.notifications.len() > MAX_NOTIFICATIONS {
            if let Some((oldest, _)) = self.notifications.pop_first() {
                self.raise_floor(oldest);
            }
        }

        // Overflowing tombstones only seal identities below the live set. With
        // nothing live there is no safe bound and the marker is just dropped.
        while self.deleted_ids.len() > MAX_DELETED_IDS {
            if let Some(oldest) = self.deleted_ids.pop_first() {
                if let Some(lowest) = self.last_id() {
                    self.raise_floor(oldest.min(lowest.saturating_sub(1)));
                }
            }
        }

        if let Some(floor) = self.floor {
            self.notifications.retain(|id, _| *id > floor);
            self.deleted_ids.retain(|id| *id > floor);
        }
    }
}

impl Mergeable for NotificationFeed {
    /// Union of live records and tombstones, tombstones applied after the
    /// union, then the size bounds.
    fn merge(&mut self, other: &Self) {
        if self.key.is_empty() {
            self.key = other.key.clone();
        }
        for (id, notification) in &other.notifications {
            self.notifications
                .entry(*id)
                .or_insert_with(|| notification.clone());
        }
        self.deleted_ids.extend(other.deleted_ids.iter().copied());
        if let Some(floor) = other.floor {
            self.raise_floor(floor);
        }
        self.normalize();
    }
}
