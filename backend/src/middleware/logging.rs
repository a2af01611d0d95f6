use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::middleware::request_id::RequestId;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;

/// Logs every 4xx/5xx response with a preview of its body. The body is
/// buffered and handed back unchanged; event streams are never buffered.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_event_stream(&response) {
        return response;
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    let (mut parts, body) = response.into_parts();
    let (body, preview) = match to_bytes(body, MAX_BUFFERED_BODY_BYTES).await {
        Ok(bytes) => {
            let preview = preview(&bytes);
            (Body::from(bytes), preview)
        }
        Err(err) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            (Body::empty(), format!("<unreadable body: {err}>"))
        }
    };

    if status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            %method,
            %uri,
            %request_id,
            latency_ms,
            body = %preview,
            "request failed"
        );
    } else {
        tracing::warn!(
            status = status.as_u16(),
            %method,
            %uri,
            %request_id,
            latency_ms,
            body = %preview,
            "request rejected"
        );
    }
    Response::from_parts(parts, body)
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

fn preview(bytes: &Bytes) -> String {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_BYTES]),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
