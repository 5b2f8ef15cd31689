use axum::extract::FromRef;

use crate::cursors::CursorStore;
use crate::error::StoreError;
use crate::kv::KvBackend;
use crate::notifications::{IdGenerator, NotificationService, NotificationStore};
use std::sync::Arc;
use tracing::info;

use super::ServerConfig;

pub type GuardedBackend = Arc<dyn KvBackend>;
pub type GuardedNotificationStore = Arc<NotificationStore>;
pub type GuardedNotificationService = Arc<NotificationService>;
pub type GuardedCursorStore = Arc<CursorStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub backend: GuardedBackend,
    pub notification_store: GuardedNotificationStore,
    pub notification_service: GuardedNotificationService,
    pub cursor_store: GuardedCursorStore,
}

impl ServerState {
    /// Builds the stores on top of the backend and turns on sibling
    /// surfacing for their namespaces.
    pub fn new(
        config: ServerConfig,
        backend: GuardedBackend,
        id_generator: IdGenerator,
    ) -> Result<Self, StoreError> {
        info!(
            "Generating notification ids with worker id {}",
            id_generator.worker_id()
        );
        let notification_store = Arc::new(NotificationStore::new(backend.clone(), id_generator));
        let cursor_store = Arc::new(CursorStore::new(backend.clone()));
        notification_store.initialize()?;
        cursor_store.initialize()?;

        let notification_service = Arc::new(NotificationService::new(
            notification_store.clone(),
            cursor_store.clone(),
        ));

        Ok(ServerState {
            config,
            backend,
            notification_store,
            notification_service,
            cursor_store,
        })
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedBackend {
    fn from_ref(input: &ServerState) -> Self {
        input.backend.clone()
    }
}

impl FromRef<ServerState> for GuardedNotificationStore {
    fn from_ref(input: &ServerState) -> Self {
        input.notification_store.clone()
    }
}

impl FromRef<ServerState> for GuardedNotificationService {
    fn from_ref(input: &ServerState) -> Self {
        input.notification_service.clone()
    }
}

impl FromRef<ServerState> for GuardedCursorStore {
    fn from_ref(input: &ServerState) -> Self {
        input.cursor_store.clone()
    }
}
