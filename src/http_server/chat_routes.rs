//! Chat Webhook Routes
//!
//! The messaging platform posts every inbound message here. Business-logic
//! failures (invalid code, expired, quota) are answered inside a success
//! payload so the platform neither retries nor drops the message; only
//! transport-level faults produce error statuses.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::server::GateState;
use crate::onboarding::{ChatReply, GateOutcome, InboundMessage};

/// Inbound webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// External messaging identity
    pub user_id: String,

    /// Display-name hint from the platform
    #[serde(default)]
    pub display_name: Option<String>,

    /// Free-text message body
    pub message: String,
}

/// Liveness payload
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

/// Webhook routes
pub fn chat_routes(state: Arc<GateState>) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .with_state(state)
}

/// Health routes at the root level
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "codegate",
    })
}

/// One inbound message: gate, then answer or instruct. Always 200.
async fn chat_handler(
    State(state): State<Arc<GateState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatReply> {
    if request.user_id.trim().is_empty() {
        return Json(ChatReply::text(
            "This service needs a sender identity to respond.",
        ));
    }
    if request.message.trim().is_empty() {
        return Json(ChatReply::text("Please send a message or a verification code."));
    }

    let message = InboundMessage {
        external_id: request.user_id,
        display_name: request.display_name,
        text: request.message,
    };

    let reply = match state.protocol.intercept(&message) {
        Ok(GateOutcome::Reply(reply)) => reply,
        Ok(GateOutcome::Authorized(profile)) => {
            state.queries.answer(&profile, &message.text).await
        }
        // dependency failure: the gate fails closed, the transport does not
        Err(e) => ChatReply::text(e.user_message()),
    };

    Json(reply)
}
