//! HTTP client wrapper for end-to-end tests

use super::constants::*;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

pub struct TestClient {
    client: Client,
    base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self { client, base_url }
    }

    fn notifications_url(&self, username: &str) -> String {
        format!("{}/v1/notifications/{}", self.base_url, username)
    }

    fn cursor_url(&self, username: &str, cursor: &str) -> String {
        format!("{}/v1/cursors/{}/{}", self.base_url, username, cursor)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub async fn get_notifications(&self, username: &str) -> Response {
        self.client
            .get(self.notifications_url(username))
            .send()
            .await
            .expect("GET notifications failed")
    }

    pub async fn get_notifications_with_range(&self, username: &str, range: &str) -> Response {
        self.client
            .get(self.notifications_url(username))
            .header("Range", range)
            .send()
            .await
            .expect("GET notifications with range failed")
    }

    pub async fn post_notification(&self, username: &str, body: Value) -> Response {
        self.client
            .post(self.notifications_url(username))
            .json(&body)
            .send()
            .await
            .expect("POST notification failed")
    }

    /// Posts a notification in the test category and returns its identity.
    pub async fn post_message(&self, username: &str, message: &str) -> i64 {
        let response = self
            .post_notification(
                username,
                serde_json::json!({ "category": TEST_CATEGORY, "message": message }),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid notification JSON");
        body["id"].as_i64().expect("Stored notification has no id")
    }

    pub async fn delete_notifications(&self, username: &str, ids: &[i64]) -> Response {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.client
            .delete(self.notifications_url(username))
            .query(&[("ids", ids)])
            .send()
            .await
            .expect("DELETE notifications failed")
    }

    pub async fn delete_all_notifications(&self, username: &str) -> Response {
        self.client
            .delete(self.notifications_url(username))
            .send()
            .await
            .expect("DELETE all notifications failed")
    }

    // ========================================================================
    // Cursors
    // ========================================================================

    pub async fn get_cursor(&self, username: &str, cursor: &str) -> Response {
        self.client
            .get(self.cursor_url(username, cursor))
            .send()
            .await
            .expect("GET cursor failed")
    }

    pub async fn put_cursor(&self, username: &str, cursor: &str, value: i64) -> Response {
        self.client
            .put(self.cursor_url(username, cursor))
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await
            .expect("PUT cursor failed")
    }

    pub async fn delete_cursor(&self, username: &str, cursor: &str) -> Response {
        self.client
            .delete(self.cursor_url(username, cursor))
            .send()
            .await
            .expect("DELETE cursor failed")
    }

    pub async fn ping(&self) -> Response {
        self.client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .expect("GET ping failed")
    }
}
