// # HTTP Fetch Trait
//
// Defines the GET primitive used both for pushing updates to the provider
// and for public IP discovery.
//
// ## Implementations
//
// - reqwest based: `dnsmon-http` crate

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Status reported for failures that never produced an HTTP response
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

/// Outcome of a GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// True only for HTTP 200 and 204
    pub success: bool,
    /// HTTP status code, or 500 for transport failures
    pub status: u16,
    /// Response body as text, or a diagnostic for transport failures
    pub body: String,
}

impl FetchResponse {
    /// Classify a received response
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            success: is_success_status(status),
            status,
            body: body.into(),
        }
    }

    /// A request that failed before a response was received
    /// (DNS failure, connection refused, timeout, cancellation)
    pub fn transport_failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            status: TRANSPORT_FAILURE_STATUS,
            body: detail.into(),
        }
    }
}

/// Whether a status counts as success: only 200 OK and 204 No Content
pub fn is_success_status(status: u16) -> bool {
    status == 200 || status == 204
}

/// Trait for HTTP GET implementations
///
/// `get` never fails: every network-level error is folded into a
/// [`FetchResponse::transport_failure`]. Error bodies are still captured so
/// callers can log them.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Perform a GET on `url`, giving up as soon as `cancel` fires
    async fn get(&self, url: &str, cancel: &CancellationToken) -> FetchResponse;
}
