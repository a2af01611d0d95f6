use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    models::chat::{ChatReply, ChatRequest, CheckSecretResponse, HealthResponse},
    services::chat::ChatError,
    state::AppState,
    utils::time::now_ms,
};

/// `POST /chat`. Malformed bodies are treated like an empty message.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ChatError> {
    let message = match payload {
        Ok(Json(request)) => request.message,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable chat request body");
            None
        }
    };
    let reply = state.chat.reply(message.as_deref()).await?;
    Ok(Json(ChatReply { reply }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: now_ms(),
    })
}

pub async fn check_secret(State(state): State<AppState>) -> Json<CheckSecretResponse> {
    Json(CheckSecretResponse {
        has_gemini_key: state.config.has_gemini_key(),
    })
}
