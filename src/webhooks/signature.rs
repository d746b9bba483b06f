//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs webhook payloads using HMAC-SHA256 with the App's webhook secret.
//! The signature is provided in the `X-Hub-Signature-256` header as `sha256=<hex>`.
//! Verification happens before the body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix GitHub puts in front of the hex digest.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Reasons a signature header can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header does not start with `sha256=`.
    #[error("signature header is missing the sha256= prefix")]
    MissingPrefix,

    /// The digest is not valid hex.
    #[error("signature header contains invalid hex")]
    InvalidHex,

    /// The digest does not match the payload.
    #[error("signature does not match payload")]
    Mismatch,
}

/// Parses a GitHub signature header (e.g., "sha256=abc123...") into raw bytes.
///
/// Never panics.
///
/// # Examples
///
/// ```
/// use github_app_router::webhooks::{parse_signature_header, SignatureError};
///
/// assert!(parse_signature_header("sha256=abcd1234").is_ok());
/// assert_eq!(parse_signature_header("abcd1234"), Err(SignatureError::MissingPrefix));
/// assert_eq!(parse_signature_header("sha1=abcd1234"), Err(SignatureError::MissingPrefix));
/// assert_eq!(parse_signature_header("sha256=xyz"), Err(SignatureError::InvalidHex));
/// ```
pub fn parse_signature_header(header: &str) -> Result<Vec<u8>, SignatureError> {
    let hex_sig = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::MissingPrefix)?;
    hex::decode(hex_sig).map_err(|_| SignatureError::InvalidHex)
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
///
/// Used to sign test deliveries and by [`verify_signature`].
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    keyed_mac(payload, secret).finalize().into_bytes().to_vec()
}

/// Formats a signature as a GitHub-style header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature))
}

/// Verifies a GitHub webhook signature against the payload and secret.
///
/// The digest comparison is constant-time.
///
/// # Examples
///
/// ```
/// use github_app_router::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = b"Hello, World!";
/// let header = format_signature_header(&compute_signature(payload, b"my-secret-key"));
///
/// assert!(verify_signature(payload, &header, b"my-secret-key").is_ok());
/// assert!(verify_signature(payload, &header, b"wrong-secret").is_err());
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let expected = parse_signature_header(signature_header)?;
    keyed_mac(payload, secret)
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

fn keyed_mac(payload: &[u8], secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac
}
