//! HTTP transport abstraction for the Skland companion.
//!
//! The credential pipeline never talks to `reqwest` directly; it goes through
//! the [`HttpClient`] trait so the exchange chain and orchestrator can be
//! exercised against scripted transports in tests. The trait contract is
//! deliberately small: one request in, one response (or transport error) out,
//! with status codes and header values preserved verbatim — signature
//! validation and credential extraction depend on exact values.

mod client;
mod error;
mod request;

pub use client::ReqwestClient;
pub use error::{TransportError, TransportResult};
pub use request::{HttpRequest, HttpResponse, Method};

use futures_util::future::BoxFuture;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Abstract HTTP collaborator consumed by the credential pipeline.
pub trait HttpClient: Send + Sync {
    /// Execute a single HTTP round trip.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>>;
}

/// Shared handle to an HTTP transport implementation.
pub type HttpHandle = Arc<dyn HttpClient>;

/// Summarize a response body for logging without leaking its contents.
pub fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_summary_is_stable_and_opaque() {
        let a = summarize_response_body(r#"{"token":"secret-value"}"#);
        let b = summarize_response_body(r#"{"token":"secret-value"}"#);
        assert_eq!(a, b);
        assert!(!a.contains("secret-value"));
        assert!(a.starts_with("len=24,"));
    }
}
