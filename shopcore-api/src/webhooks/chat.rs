use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use shopcore_domain::NotificationPort;

use crate::state::AppState;

/// `POST {configurable path}` — the chat platform's update webhook.
/// Authentication happens in `middleware::auth::chat_secret_auth`, layered
/// in front of this route. The conversational UI itself (menus, commands,
/// pagination) is an external collaborator this core only forwards to.
pub async fn handle_chat_update(State(state): State<AppState>, Json(update): Json<Value>) -> impl IntoResponse {
    tracing::debug!(?update, "received chat-platform update");

    match dispatch_to_chat_router(&state, update).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "chat update handler failed");
            state.notifier.notify_admins(format!("chat webhook handler error: {e}")).await;
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "status": "error" })))
        }
    }
}

/// Routing into the conversational UI (command parsing, menu state
/// machine, localization) lives entirely outside this core; this is the
/// seam where that external router would be invoked.
async fn dispatch_to_chat_router(_state: &AppState, _update: Value) -> Result<(), anyhow::Error> {
    Ok(())
}
