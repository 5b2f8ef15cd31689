//! Test server lifecycle management
//!
//! Each TestServer runs on its own random port with a fresh SQLite file,
//! so tests can run in parallel without sharing state.

use super::constants::*;
use notification_server::kv::SqliteBackend;
use notification_server::notifications::IdGenerator;
use notification_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub struct TestServer {
    pub base_url: String,
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Spawns a server backed by a temporary database and waits for it to
    /// answer /ping.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created or the server does not
    /// become ready in time.
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("kv.db");
        let backend = SqliteBackend::new(&db_path).expect("Failed to open test database");

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port: 0,
            metrics_port: 0,
            ..Default::default()
        };
        let id_generator = IdGenerator::new(1).expect("Failed to create id generator");
        let state = ServerState::new(config, Arc::new(backend), id_generator)
            .expect("Failed to create server state");
        let app = make_app(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("Failed to get local addr");
        let port = addr.port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Test server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            port,
            shutdown_tx: Some(shutdown_tx),
            _temp_dir: temp_dir,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        let url = format!("{}/ping", self.base_url);
        let deadline = tokio::time::Instant::now() + Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        while tokio::time::Instant::now() < deadline {
            if let Ok(response) = client.get(&url).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }

        panic!(
            "Server did not become ready within {}ms",
            SERVER_READY_TIMEOUT_MS
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
