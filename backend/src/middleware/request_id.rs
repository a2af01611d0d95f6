use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Takes the caller's `x-request-id` (or `x-correlation-id`) when it is a
    /// usable header value, otherwise mints a UUID.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let inbound = [&REQUEST_ID_HEADER, &CORRELATION_ID_HEADER]
            .into_iter()
            .filter_map(|name| headers.get(name))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN);
        Self(
            inbound
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        )
    }
}

pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = RequestId::from_headers(req.headers());
    tracing::Span::current().record("request_id", id.0.as_str());
    req.extensions_mut().insert(id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(id);
    response
}
