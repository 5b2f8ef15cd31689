//! User notification feeds

mod feed;
mod id_generator;
mod models;
pub mod range;
mod service;
mod store;

pub use feed::{NotificationFeed, MAX_DELETED_IDS, MAX_NOTIFICATIONS};
pub use id_generator::{timestamp_millis, Clock, IdGenerator, IdGeneratorError, SystemClock, MAX_WORKER_ID};
pub use models::{Notification, ValidationError};
pub use range::{Page, PageLimits, RangeHeader};
pub use service::NotificationService;
pub use store::{NotificationStore, NAMESPACE};
