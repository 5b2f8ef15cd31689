//! Notification data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single notification in a user's feed.
///
/// `id` is absent on inbound records and assigned by the store. Child
/// `notifications` are carried as an opaque payload for pre-grouped entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_unseen")]
    pub unseen: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

fn default_unseen() -> bool {
    true
}

/// Reasons an inbound notification is rejected at the HTTP boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("category must not be empty")]
    EmptyCategory,

    #[error("message must not be empty")]
    EmptyMessage,
}

impl Notification {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            category: category.into(),
            message: message.into(),
            created_at: None,
            unseen: true,
            properties: BTreeMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Notification>) -> Self {
        self.notifications = children;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }

    /// Feed order: highest identity first, records without one last.
    pub fn cmp_by_id(&self, other: &Self) -> Ordering {
        other.id.cmp(&self.id)
    }
}
