//! Per-request signing for the Skland API.
//!
//! Every session-scoped call must carry a signature computed over the request
//! path, canonical parameters, a unix-seconds timestamp, and a small JSON
//! blob of client metadata, keyed by the session sign-token:
//!
//! ```text
//! sign = MD5hex( HMAC-SHA256hex( key = sign_token,
//!                                msg = path + params + timestamp + meta_json ) )
//! ```
//!
//! The algorithm must match the server byte-for-byte: `meta_json` is the
//! compact serialization of [`SignHeaders`] with keys in the fixed order
//! `platform, timestamp, dId, vName`; for GET requests `params` is the query
//! string without the leading `?`, for POST requests it is the exact JSON
//! body string transmitted. Signing is pure and deterministic — no clock, no
//! randomness, no I/O.

use base64::Engine;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Base64 engine for device-id nonces.
const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Error type for signed-header construction.
#[derive(Error, Debug)]
pub enum SignError {
    /// The request URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client metadata included in the signature and sent as request headers.
///
/// Field order is load-bearing: the serialized JSON is part of the signed
/// string and the server serializes these keys in exactly this order.
#[derive(Debug, Clone, Serialize)]
pub struct SignHeaders {
    pub platform: String,
    pub timestamp: String,
    #[serde(rename = "dId")]
    pub d_id: String,
    #[serde(rename = "vName")]
    pub v_name: String,
}

impl SignHeaders {
    /// Build metadata for a request signed at `timestamp` (unix seconds).
    pub fn new(platform: &str, timestamp: &str, d_id: &str, v_name: &str) -> Self {
        Self {
            platform: platform.to_string(),
            timestamp: timestamp.to_string(),
            d_id: d_id.to_string(),
            v_name: v_name.to_string(),
        }
    }
}

/// Generate a per-request device-id nonce: `"BL"` + base64 of 32 random bytes.
pub fn generate_device_id() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("BL{}", BASE64.encode(bytes))
}

/// Compute the request signature.
///
/// An empty `secret` still produces a signature; the server will reject it,
/// but credential presence is gated elsewhere and signing must not be the
/// layer that fails.
pub fn sign(
    secret: &str,
    path: &str,
    canonical_params: &str,
    timestamp: &str,
    headers: &SignHeaders,
) -> String {
    // serde_json serializes struct fields in declaration order, which matches
    // the server's expected platform/timestamp/dId/vName ordering.
    let meta_json = serde_json::to_string(headers).unwrap_or_default();

    let mut message = String::with_capacity(
        path.len() + canonical_params.len() + timestamp.len() + meta_json.len(),
    );
    message.push_str(path);
    message.push_str(canonical_params);
    message.push_str(timestamp);
    message.push_str(&meta_json);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    let hmac_hex = hex_encode(&mac.finalize().into_bytes());

    let mut md5 = Md5::new();
    md5.update(hmac_hex.as_bytes());
    hex_encode(&md5.finalize())
}

/// Canonical parameter string for a parsed URL and optional JSON body.
///
/// GET: the query string with the leading `?` stripped (empty if none).
/// POST: the exact JSON body string to be transmitted (`{}` when absent).
pub fn canonical_params(method: &str, url: &url::Url, body: Option<&Value>) -> String {
    if method.eq_ignore_ascii_case("get") {
        url.query().unwrap_or("").to_string()
    } else {
        match body {
            Some(value) => value.to_string(),
            None => "{}".to_string(),
        }
    }
}

/// Build the full signed header set for a session-scoped request, using a
/// fixed timestamp and device id. Deterministic; prefer this in tests.
pub fn signed_headers_at(
    cred: &str,
    sign_token: &str,
    method: &str,
    request_url: &str,
    body: Option<&Value>,
    timestamp: &str,
    d_id: &str,
    platform: &str,
    v_name: &str,
) -> Result<Vec<(String, String)>, SignError> {
    let parsed = url::Url::parse(request_url)?;
    let params = canonical_params(method, &parsed, body);

    let headers = SignHeaders::new(platform, timestamp, d_id, v_name);
    let signature = sign(sign_token, parsed.path(), &params, timestamp, &headers);

    Ok(vec![
        ("cred".to_string(), cred.to_string()),
        ("sign".to_string(), signature),
        ("platform".to_string(), headers.platform),
        ("timestamp".to_string(), headers.timestamp),
        ("dId".to_string(), headers.d_id),
        ("vName".to_string(), headers.v_name),
    ])
}

/// Build the full signed header set for a session-scoped request, stamped
/// with the current time and a fresh device-id nonce.
pub fn signed_headers(
    cred: &str,
    sign_token: &str,
    method: &str,
    request_url: &str,
    body: Option<&Value>,
    platform: &str,
    v_name: &str,
) -> Result<Vec<(String, String)>, SignError> {
    let timestamp = unix_timestamp_secs();
    let d_id = generate_device_id();
    signed_headers_at(
        cred,
        sign_token,
        method,
        request_url,
        body,
        &timestamp,
        &d_id,
        platform,
        v_name,
    )
}

/// Current unix time in whole seconds, as the string the protocol expects.
pub fn unix_timestamp_secs() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    secs.to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
