//! Webhook server for the WhatsApp Cloud API

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use slotbot_core::SessionManager;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::conversation::{ConversationHandler, Outcome};
use crate::error::{Result, WhatsAppError};
use crate::types::{InboundMessage, WebhookPayload};

/// Shared router state
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ConversationHandler>,
    pub sessions: SessionManager,
    pub verify_token: String,
}

/// Create the webhook and health router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Meta webhook
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        // Health checks
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the webhook server
pub async fn start_webhook_server(port: u16, state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Webhook server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WhatsAppError::Config(e.to_string()))?;

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| WhatsAppError::Http(e.to_string()))?;

    Ok(())
}

/// Subscription handshake (`hub.mode`, `hub.verify_token`, `hub.challenge`)
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        info!("Webhook verified");
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        return (StatusCode::OK, challenge).into_response();
    }

    warn!("Webhook verification failed (mode: {:?})", mode);
    (StatusCode::FORBIDDEN, "Verification failed").into_response()
}

/// Handle one webhook delivery
async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Ignoring unparseable webhook body: {}", e);
            return status(Outcome::Ignored);
        }
    };

    let Some(message) = InboundMessage::from_payload(payload) else {
        debug!("Ignoring delivery without a usable message");
        return status(Outcome::Ignored);
    };

    let span = info_span!(
        "webhook",
        request_id = %Uuid::new_v4(),
        sender = %message.sender
    );
    let outcome = state.handler.handle(&message).instrument(span).await;
    status(outcome)
}

fn status(outcome: Outcome) -> Json<serde_json::Value> {
    Json(json!({ "status": outcome.as_str() }))
}

async fn health_live() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.sessions.check_ready().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready" })),
            )
        }
    }
}
