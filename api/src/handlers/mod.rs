//! Webhook and health handlers.

use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::models::{WebhookPayload, WebhookResponse};
use crate::router::{EventRouter, RouteOutcome};

/// Shared handler state
pub struct ApiState {
    /// Event router
    pub router: Arc<EventRouter>,
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "followcare" }))
}

/// Main entry point for all webhook events from the messaging platform.
/// Malformed events are rejected with a structured 400; everything else is
/// acknowledged with the routing outcome.
#[debug_handler]
pub async fn receive_webhook(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<WebhookResponse>) {
    let event = match payload.normalize() {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected webhook: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse {
                    status: "error",
                    message: e.to_string(),
                }),
            );
        }
    };

    match state.router.route(event).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(WebhookResponse {
                status: "success",
                message: outcome_message(outcome).to_string(),
            }),
        ),
        Err(e) => {
            error!("Webhook routing failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse {
                    status: "error",
                    message: e.to_string(),
                }),
            )
        }
    }
}

fn outcome_message(outcome: RouteOutcome) -> &'static str {
    match outcome {
        RouteOutcome::Scheduled => "Follow-up scheduled",
        RouteOutcome::Duplicate => "Follow-up already scheduled",
        RouteOutcome::ReplyAccepted => "Reply accepted",
        RouteOutcome::Ignored => "Ignored",
    }
}
