//! HTTP caching middleware

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};

const NO_STORE: &str = "must-revalidate, no-cache, no-store";

/// Marks responses as not cacheable by clients or proxies.
pub async fn no_store(request: Request<Body>, next: Next) -> impl IntoResponse {
    let response = next.run(request).await.into_response();

    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));

    axum::http::Response::from_parts(parts, body)
}
