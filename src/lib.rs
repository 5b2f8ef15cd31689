//! Notification Feed Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod cursors;
pub mod error;
pub mod kv;
pub mod metrics;
pub mod notifications;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use cursors::CursorStore;
pub use error::StoreError;
pub use kv::{InMemoryBackend, KvBackend, SqliteBackend};
pub use notifications::{Notification, NotificationFeed, NotificationService, NotificationStore};
pub use server::{run_server, RequestsLoggingLevel};
