//! The webhook event envelope.
//!
//! An [`Event`] is one inbound delivery: the `X-GitHub-Event` type, the
//! payload's `action` (if any), the JSON payload itself and the delivery ID.
//! It is immutable once built and is passed by reference (or behind an `Arc`)
//! through dispatch.

use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::signature::{SignatureError, verify_signature};
use crate::types::{DeliveryId, InstallationId, RepoId};

/// Header name for GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
pub const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";
/// Header name for the body's media type.
pub const HEADER_CONTENT_TYPE: &str = "content-type";

/// Errors that can occur when building an event from a delivery.
#[derive(Debug, Error)]
pub enum EventError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Body is not JSON.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Signature did not verify.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// A signature was sent but there is no secret to check it against.
    #[error("signature header present but no webhook secret is configured")]
    UnexpectedSignature,

    /// Invalid JSON body.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Body parsed, but is not a JSON object.
    #[error("webhook payload must be a JSON object")]
    NotAnObject,
}

/// One inbound webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    event_type: String,
    action: Option<String>,
    payload: Map<String, Value>,
    delivery_id: DeliveryId,
}

impl Event {
    /// Builds an event from an already-parsed payload.
    ///
    /// The action is read from the payload's top-level `"action"` string.
    ///
    /// ```
    /// use github_app_router::webhooks::Event;
    /// use serde_json::json;
    ///
    /// let payload = json!({"action": "created", "comment": {"body": "hi"}});
    /// let event = Event::new("issue_comment", payload.as_object().unwrap().clone(), "d-1");
    /// assert_eq!(event.action(), Some("created"));
    /// ```
    pub fn new(
        event_type: impl Into<String>,
        payload: Map<String, Value>,
        delivery_id: impl Into<DeliveryId>,
    ) -> Self {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);
        Event {
            event_type: event_type.into(),
            action,
            payload,
            delivery_id: delivery_id.into(),
        }
    }

    /// Parses a raw JSON body. The body must be a JSON object.
    pub fn from_json(
        event_type: impl Into<String>,
        delivery_id: impl Into<DeliveryId>,
        body: &[u8],
    ) -> Result<Self, EventError> {
        match serde_json::from_slice(body)? {
            Value::Object(payload) => Ok(Event::new(event_type, payload, delivery_id)),
            _ => Err(EventError::NotAnObject),
        }
    }

    /// Builds an event from an HTTP delivery, verifying its signature.
    ///
    /// With a non-empty `secret`, the `X-Hub-Signature-256` header is required
    /// and must match. With no secret, a delivery that carries a signature is
    /// rejected rather than accepted unchecked.
    pub fn from_http(headers: &HeaderMap, body: &[u8], secret: &[u8]) -> Result<Self, EventError> {
        let content_type = get_header(headers, HEADER_CONTENT_TYPE)?;
        if !is_json_media_type(content_type) {
            return Err(EventError::UnsupportedContentType(content_type.to_string()));
        }

        let event_type = get_header(headers, HEADER_EVENT)?;
        let delivery_id = get_header(headers, HEADER_DELIVERY)?;

        if secret.is_empty() {
            if headers.contains_key(HEADER_SIGNATURE) {
                return Err(EventError::UnexpectedSignature);
            }
        } else {
            let signature = get_header(headers, HEADER_SIGNATURE)?;
            verify_signature(body, signature, secret)?;
        }

        Event::from_json(event_type, delivery_id, body)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn delivery_id(&self) -> &DeliveryId {
        &self.delivery_id
    }

    /// Returns a top-level payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Walks nested objects, e.g. `["comment", "body"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.payload.get(*first)?, |value, key| value.get(*key))
    }

    /// The App installation the delivery was sent for (`installation.id`).
    pub fn installation_id(&self) -> Option<InstallationId> {
        self.get_path(&["installation", "id"])
            .and_then(Value::as_u64)
            .map(InstallationId)
    }

    /// The repository the delivery concerns, if the payload names one.
    pub fn repository(&self) -> Option<RepoId> {
        let owner = self
            .get_path(&["repository", "owner", "login"])
            .and_then(Value::as_str);
        let name = self.get_path(&["repository", "name"]).and_then(Value::as_str);
        match (owner, name) {
            (Some(owner), Some(name)) => Some(RepoId::new(owner, name)),
            _ => self
                .get_path(&["repository", "full_name"])
                .and_then(Value::as_str)
                .and_then(RepoId::from_full_name),
        }
    }
}

/// Extracts a required header value as a string.
fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, EventError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(EventError::MissingHeader(name))
}

/// Accepts `application/json` with optional parameters (`; charset=utf-8`).
fn is_json_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}
