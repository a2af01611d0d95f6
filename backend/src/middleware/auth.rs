use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, state::AppState, utils::jwt::verify_access_token};

const MISSING_TOKEN: &str = "Missing bearer token";
const INVALID_TOKEN: &str = "Invalid or expired token";

/// Verifies the bearer token and attaches the caller's `Session` to the
/// request extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.into()))?;
    let claims = verify_access_token(&token, &state.config.jwt_secret).map_err(|err| {
        tracing::debug!(error = %err, "rejected bearer token");
        AppError::Unauthorized(INVALID_TOKEN.into())
    })?;

    let session = claims.session();
    tracing::Span::current().record("uid", session.uid.as_str());
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| rest.trim_start())
}
