//! Webhook ingestion for GitHub App deliveries.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - The immutable [`Event`] envelope built from a verified delivery

pub mod event;
pub mod signature;

pub use event::{Event, EventError};
pub use signature::{
    SignatureError, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};
