use anyhow::Context;
use std::future::IntoFuture;

use tracing::{error, info, warn};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use super::{assign_request_id, log_requests, no_store, state::*, ServerConfig};
use crate::cursors::{is_valid_cursor_name, CursorObject};
use crate::error::StoreError;
use crate::metrics::metrics_handler;
use crate::notifications::range::{paginate, ACCEPT_RANGES};
use crate::notifications::{Notification, RangeHeader, ValidationError};

const NEXT_RANGE: &str = "next-range";

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(&'static str),
    BadRequest(String),
    Validation(ValidationError),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            ApiError::Store(err) => {
                error!("Store operation failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unable to complete the request".to_string(),
                )
            }
        };
        let body = ErrorBody {
            code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Runs a blocking store call off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|err| {
        error!("Blocking store task did not complete: {}", err);
        Err(StoreError::Interrupted)
    })
}

fn insert_header(response: &mut Response, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(_) => warn!("Skipping invalid {} header value {:?}", name.as_str(), value),
    }
}

async fn get_notifications(
    State(service): State<GuardedNotificationService>,
    State(config): State<ServerConfig>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range_header = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default().to_string());
    let range = match &range_header {
        Some(value) => RangeHeader::parse(value, config.page_limits),
        None => RangeHeader::from_top(config.page_limits.default_size),
    };

    let notifications = run_blocking(move || service.fetch(&username))
        .await?
        .ok_or(ApiError::NotFound("Notifications not found"))?;
    let page = paginate(&notifications, &range);

    let status = if range_header.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut response = (status, Json(&page.notifications)).into_response();
    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static(ACCEPT_RANGES));
    insert_header(
        &mut response,
        header::CONTENT_RANGE,
        &page.content_range(notifications.len()),
    );
    if let Some(next_range) = page.next_range(range.max) {
        insert_header(
            &mut response,
            header::HeaderName::from_static(NEXT_RANGE),
            &next_range,
        );
    }
    Ok(response)
}

async fn post_notification(
    State(store): State<GuardedNotificationStore>,
    Path(username): Path<String>,
    Json(notification): Json<Notification>,
) -> Result<Response, ApiError> {
    notification.validate()?;

    let location = format!("/v1/notifications/{}", username);
    let stored = run_blocking(move || store.store(&username, notification)).await?;

    let mut response = (StatusCode::CREATED, Json(stored)).into_response();
    insert_header(&mut response, header::LOCATION, &location);
    Ok(response)
}

#[derive(Deserialize, Debug)]
struct DeleteParams {
    /// Comma separated identities. Absent means every notification.
    ids: Option<String>,
}

fn parse_ids(value: &str) -> Result<Vec<i64>, ApiError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid notification id: {}", id)))
        })
        .collect()
}

async fn delete_notifications(
    State(store): State<GuardedNotificationStore>,
    Path(username): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    match params.ids {
        Some(ids) => {
            let ids = parse_ids(&ids)?;
            run_blocking(move || store.remove(&username, &ids)).await?;
        }
        None => run_blocking(move || store.remove_all(&username)).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

fn check_cursor_name(cursor: &str) -> Result<(), ApiError> {
    if is_valid_cursor_name(cursor) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid cursor name: {}",
            cursor
        )))
    }
}

async fn get_cursor(
    State(cursors): State<GuardedCursorStore>,
    Path((username, cursor)): Path<(String, String)>,
) -> Result<Json<CursorObject>, ApiError> {
    check_cursor_name(&cursor)?;
    let value = run_blocking(move || cursors.fetch(&username, &cursor))
        .await?
        .ok_or(ApiError::NotFound("Cursor not found"))?;
    Ok(Json(CursorObject { value }))
}

async fn put_cursor(
    State(cursors): State<GuardedCursorStore>,
    Path((username, cursor)): Path<(String, String)>,
    Json(body): Json<CursorObject>,
) -> Result<Json<CursorObject>, ApiError> {
    check_cursor_name(&cursor)?;
    let value = run_blocking(move || cursors.store(&username, &cursor, body.value)).await?;
    Ok(Json(CursorObject { value }))
}

async fn delete_cursor(
    State(cursors): State<GuardedCursorStore>,
    Path((username, cursor)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    check_cursor_name(&cursor)?;
    run_blocking(move || cursors.delete(&username, &cursor)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ping(State(backend): State<GuardedBackend>) -> Response {
    match run_blocking(move || backend.ping().map_err(StoreError::from)).await {
        Ok(()) => (StatusCode::OK, "pong").into_response(),
        Err(err) => {
            warn!("Backend health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "backend unavailable").into_response()
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let notification_routes: Router = Router::new()
        .route(
            "/{username}",
            get(get_notifications)
                .post(post_notification)
                .delete(delete_notifications),
        )
        .layer(middleware::from_fn(no_store))
        .with_state(state.clone());

    let cursor_routes: Router = Router::new()
        .route(
            "/{username}/{cursor}",
            get(get_cursor).put(put_cursor).delete(delete_cursor),
        )
        .layer(middleware::from_fn(no_store))
        .with_state(state.clone());

    Router::new()
        .route("/ping", get(ping))
        .with_state(state.clone())
        .nest("/v1/notifications", notification_routes)
        .nest("/v1/cursors", cursor_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
        .layer(middleware::from_fn(assign_request_id))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Serves the API and the Prometheus endpoint until interrupted.
pub async fn run_server(state: ServerState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let app = make_app(state);
    let metrics_app = Router::new().route("/metrics", get(metrics_handler));

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    let metrics_listener = TcpListener::bind(("0.0.0.0", config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", config.metrics_port))?;

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let metrics_server =
        axum::serve(metrics_listener, metrics_app).with_graceful_shutdown(shutdown_signal());
    tokio::try_join!(server.into_future(), metrics_server.into_future())?;

    Ok(())
}
