//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, verifies their signatures, makes sure
//! the suspendable handler set is loaded and dispatches the event before
//! answering.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Map;
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::github::ClientError;
use crate::routing::{CallingConvention, DispatchError};
use crate::types::DeliveryId;
use crate::webhooks::{Event, EventError};

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery could not be turned into an event.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A handler failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// No client could be scoped to the delivery's installation.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Event(EventError::InvalidSignature(_))
            | WebhookError::Event(EventError::UnexpectedSignature) => StatusCode::UNAUTHORIZED,
            WebhookError::Event(_) => StatusCode::BAD_REQUEST,
            WebhookError::Dispatch(_) | WebhookError::Client(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Body of a successful webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: &'static str,
    pub delivery_id: DeliveryId,
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `Content-Type`: `application/json`
///   - `X-GitHub-Event`: Event type (e.g., "issue_comment")
///   - `X-GitHub-Delivery`: Unique delivery ID
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature, when a secret is configured
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK: Every matching handler ran
/// - 400 Bad Request: Missing header, wrong content type or invalid JSON
/// - 401 Unauthorized: Invalid or unexpected signature
/// - 500 Internal Server Error: A handler failed, or the installation client
///   could not be created
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-GitHub-Event: issue_comment
/// X-GitHub-Delivery: 550e8400-e29b-41d4-a716-446655440000
/// X-Hub-Signature-256: sha256=...
/// Content-Type: application/json
///
/// {"action": "created", "comment": {"body": "@my-app ping"}, ...}
///
/// HTTP/1.1 200 OK
///
/// {"message": "ok", "delivery_id": "550e8400-e29b-41d4-a716-446655440000"}
/// ```
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let event = Event::from_http(&headers, &body, app_state.config().webhook_secret.as_bytes())
        .inspect_err(|e| warn!(error = %e, "Rejected webhook delivery"))?;

    debug!(
        delivery_id = %event.delivery_id(),
        event_type = %event.event_type(),
        action = ?event.action(),
        "Received webhook"
    );

    app_state
        .loader()
        .ensure_loaded(CallingConvention::Suspendable, app_state.registry());

    let client = match event.installation_id() {
        Some(installation) => app_state
            .client()
            .with_installation(installation)
            .inspect_err(|e| warn!(%installation, error = %e, "Cannot scope client"))?,
        None => app_state.client().clone(),
    };

    let delivery_id = event.delivery_id().clone();
    app_state
        .registry()
        .dispatch_async(Arc::new(event), client, Map::new())
        .await?;

    Ok(Json(WebhookResponse {
        message: "ok",
        delivery_id,
    }))
}
