//! End-to-end tests for the notification feed endpoints

mod common;

use common::{TestClient, TestServer, TEST_CATEGORY, TEST_USER, UNKNOWN_USER};
use reqwest::StatusCode;
use serde_json::{json, Value};

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap().to_string())
}

async fn post_many(client: &TestClient, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        ids.push(client.post_message(TEST_USER, &format!("message {}", i)).await);
    }
    // Highest identity first, the order the feed is served in.
    ids.reverse();
    ids
}

fn ids_of(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_unknown_user_has_no_feed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.get_notifications(UNKNOWN_USER).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        header(&response, "cache-control").as_deref(),
        Some("must-revalidate, no-cache, no-store")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_store_and_fetch_round_trip() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_notification(
            TEST_USER,
            json!({
                "category": TEST_CATEGORY,
                "message": "you have a new follower",
                "properties": { "first_name": "Test", "last_name": "User" }
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        header(&response, "location"),
        Some(format!("/v1/notifications/{}", TEST_USER))
    );
    let stored: Value = response.json().await.unwrap();
    let id = stored["id"].as_i64().unwrap();

    let response = client.get_notifications(TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "accept-ranges").as_deref(), Some("id"));
    assert_eq!(
        header(&response, "content-range"),
        Some(format!("id {}..{}", id, id))
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![id]);
    assert_eq!(body[0]["category"], TEST_CATEGORY);
    assert_eq!(body[0]["message"], "you have a new follower");
    assert_eq!(body[0]["properties"]["last_name"], "User");
    assert_eq!(body[0]["created_at"], stored["created_at"]);
    assert_eq!(body[0]["unseen"], true);
}

#[tokio::test]
async fn test_unseen_flag_follows_read_cursor() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let first = client.post_message(TEST_USER, "first").await;
    client.get_notifications(TEST_USER).await;
    let second = client.post_message(TEST_USER, "second").await;

    let body: Value = client.get_notifications(TEST_USER).await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![second, first]);
    assert_eq!(body[0]["unseen"], true);
    assert_eq!(body[1]["unseen"], false);

    let cursor: Value = client
        .get_cursor(TEST_USER, "notifications")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cursor["value"], second);
}

#[tokio::test]
async fn test_default_page_without_range() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ids = post_many(&client, 30).await;

    let response = client.get_notifications(TEST_USER).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-range"),
        Some(format!("id {}..{}", ids[0], ids[19]))
    );
    assert_eq!(
        header(&response, "next-range"),
        Some(format!("id ]{}..; max=20", ids[19]))
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(ids_of(&body), ids[..20].to_vec());
}

#[tokio::test]
async fn test_walks_feed_with_next_range() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ids = post_many(&client, 7).await;

    let mut collected = Vec::new();
    let mut range = "id;max=3".to_string();
    loop {
        let response = client.get_notifications_with_range(TEST_USER, &range).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let next = header(&response, "next-range");
        let body: Value = response.json().await.unwrap();
        collected.extend(ids_of(&body));
        match next {
            Some(next) => range = next,
            None => break,
        }
    }

    assert_eq!(collected, ids);
}

#[tokio::test]
async fn test_inclusive_range_starts_at_boundary() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ids = post_many(&client, 5).await;

    let response = client
        .get_notifications_with_range(TEST_USER, &format!("id {}..; max=2", ids[1]))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header(&response, "content-range"),
        Some(format!("id {}..{}", ids[1], ids[2]))
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![ids[1], ids[2]]);
}

#[tokio::test]
async fn test_missing_range_boundary_falls_back_to_top() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ids = post_many(&client, 3).await;

    let response = client
        .get_notifications_with_range(TEST_USER, "id ]1..; max=2")
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![ids[0], ids[1]]);
}

#[tokio::test]
async fn test_oversized_page_is_clamped() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    post_many(&client, 3).await;

    let response = client
        .get_notifications_with_range(TEST_USER, "id; max=100000")
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert!(header(&response, "next-range").is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_rejects_invalid_notification() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .post_notification(TEST_USER, json!({ "category": "", "message": "hi" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 422);

    // Nothing was written.
    let response = client.get_notifications(TEST_USER).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_selected_notifications() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ids = post_many(&client, 4).await;

    let response = client
        .delete_notifications(TEST_USER, &[ids[0], ids[2]])
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body: Value = client.get_notifications(TEST_USER).await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![ids[1], ids[3]]);

    // Deleting again is harmless.
    let response = client.delete_notifications(TEST_USER, &[ids[0]]).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_delete_all_leaves_empty_feed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    post_many(&client, 3).await;

    let response = client.delete_all_notifications(TEST_USER).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get_notifications(TEST_USER).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-range").as_deref(), Some("id */0"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!([]));

    // The feed keeps working after a full delete.
    let id = client.post_message(TEST_USER, "after").await;
    let body: Value = client.get_notifications(TEST_USER).await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![id]);
}

#[tokio::test]
async fn test_feeds_are_per_user() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let mine = client.post_message(TEST_USER, "mine").await;
    let theirs = client.post_message("otheruser", "theirs").await;

    let body: Value = client.get_notifications(TEST_USER).await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![mine]);
    let body: Value = client.get_notifications("otheruser").await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![theirs]);
}

#[tokio::test]
async fn test_deleting_unknown_ids_keeps_feed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let first = client.post_message(TEST_USER, "first").await;

    let unknown: Vec<i64> = (0..1001).map(|offset| i64::MAX - offset).collect();
    let response = client.delete_notifications(TEST_USER, &unknown).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let second = client.post_message(TEST_USER, "second").await;
    let body: Value = client.get_notifications(TEST_USER).await.json().await.unwrap();
    assert_eq!(ids_of(&body), vec![second, first]);
}
