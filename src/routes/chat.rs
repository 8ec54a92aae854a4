use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use tracing::{info, warn};

use crate::chat::service::general_error;
use crate::models::{AppState, ChatRequest, ChatResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

/// Always answers 200; failures arrive as localized reply text.
/// The body is read as JSON whatever its content type (widgets often post `text/plain`).
pub async fn post_chat(State(state): State<AppState>, body: Bytes) -> Json<ChatResponse> {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected malformed chat request");
            return Json(ChatResponse {
                reply: general_error(format!("リクエストの解析に失敗しました: {}", e)),
            });
        }
    };

    info!(site_id = ?request.site_id, "Received chat request");

    let reply = state
        .chat
        .process_message(&request.message, request.site_id)
        .await;

    Json(ChatResponse { reply })
}
