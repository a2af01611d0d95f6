//! API error type.
//!
//! Every handler returns `Result<_, AppError>`. Failures render as
//! `{ "error": <message>, "code": <CODE>, "details"?: ... }` with the
//! matching HTTP status. Store transaction aborts carry the domain message
//! that explains the refused state change and surface as `409`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    /// Refused state transition, e.g. approving a request twice.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    /// Logged in full, rendered as a generic message.
    #[error("Internal server error")]
    InternalServerError(anyhow::Error),
    /// One `field: rule` entry per failed payload check.
    #[error("Validation failed")]
    Validation(Vec<String>),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::InternalServerError(err) = &self {
            tracing::error!(error = ?err, "request failed");
        }
        let details = match &self {
            AppError::Validation(errors) => Some(json!({ "errors": errors })),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
            details,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Aborted(msg) => AppError::Conflict(msg),
            other => AppError::InternalServerError(other.into()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| errs.iter().map(move |e| format!("{field}: {}", e.code)))
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn message_variants_render_status_code_and_message() {
        let cases = [
            (AppError::NotFound("Bus not found".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Unauthorized("Missing bearer token".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("Only drivers can register a bus.".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("Alert is already resolved.".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::BadRequest("bad date".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        ];
        for (err, status, code) in cases {
            let message = err.to_string();
            let response = err.into_response();
            assert_eq!(response.status(), status);
            let json = response_json(response).await;
            assert_eq!(json["error"], message);
            assert_eq!(json["code"], code);
            assert!(json.get("details").is_none());
        }
    }

    #[tokio::test]
    async fn validation_errors_list_failed_fields() {
        let response = AppError::Validation(vec!["lat: range".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Validation failed");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["details"]["errors"][0], "lat: range");
    }

    #[tokio::test]
    async fn aborted_transaction_is_a_conflict_with_its_message() {
        let err: AppError = StoreError::Aborted("A request is already pending.".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = response_json(response).await;
        assert_eq!(json["error"], "A request is already pending.");
    }

    #[tokio::test]
    async fn store_failures_are_masked() {
        let err: AppError = StoreError::Closed.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "INTERNAL_SERVER_ERROR");
        assert!(json["details"].is_null());
    }
}
