//! Request-Id middleware

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "request-id";

/// Identifier of the current request, available to handlers as an extension.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tags every request with an id and echoes it back in the `Request-Id`
/// response header. A well-formed id sent by the client is kept.
pub async fn assign_request_id(mut request: Request<Body>, next: Next) -> impl IntoResponse {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string();

    debug!("{} {} [{}]", request.method(), request.uri().path(), request_id);
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await.into_response();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
