//! Read path combining user feeds with the read cursor

use std::sync::Arc;
use tracing::{debug, warn};

use super::models::Notification;
use super::store::NotificationStore;
use crate::cursors::{CursorStore, DEFAULT_CURSOR};
use crate::error::StoreError;

/// Derives the `unseen` flag from the user's read cursor and moves the
/// cursor forward once the feed has been handed out.
pub struct NotificationService {
    store: Arc<NotificationStore>,
    cursors: Arc<CursorStore>,
}

impl NotificationService {
    pub fn new(store: Arc<NotificationStore>, cursors: Arc<CursorStore>) -> Self {
        Self { store, cursors }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Returns the user's notifications, highest identity first, or `None` if
    /// the user has no feed.
    pub fn fetch(&self, username: &str) -> Result<Option<Vec<Notification>>, StoreError> {
        let Some(feed) = self.store.fetch(username)? else {
            return Ok(None);
        };
        let mut notifications = feed.to_vec();

        let watermark = match self.cursors.fetch(username, DEFAULT_CURSOR) {
            Ok(watermark) => watermark,
            Err(err) => {
                warn!("Failed to read cursor for {}: {}", username, err);
                return Ok(Some(notifications));
            }
        };
        if let Some(watermark) = watermark {
            for notification in &mut notifications {
                notification.unseen = notification.id.is_some_and(|id| id > watermark);
            }
        }

        if let Some(newest) = feed.first_id() {
            if watermark.map_or(true, |watermark| newest > watermark) {
                match self.cursors.store(username, DEFAULT_CURSOR, newest) {
                    Ok(value) => debug!("Advanced cursor for {} to {}", username, value),
                    Err(err) => warn!("Failed to advance cursor for {}: {}", username, err),
                }
            }
        }

        Ok(Some(notifications))
    }
}
