// # HTTP Fetcher
//
// This crate provides the reqwest-based `HttpFetcher` used by the monitor
// for both public IP discovery and provider update requests.
//
// ## Behavior
//
// - Status 200 and 204 are success, every other status is failure
// - The body is read for every received response, including errors
// - Transport failures (DNS, connect, timeout, cancellation) become a
//   synthesized response with status 500 and a diagnostic body
// - Cancellation is observed while connecting and while reading the body
//
// ## Secrets
//
// Update URLs carry the provider password in the query string. URLs are never
// logged and transport diagnostics are stripped of the URL before they are
// stored in the response body.

use dnsmon_core::traits::{FetchResponse, HttpFetcher};
use dnsmon_core::{Error, Result};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default whole-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dnsmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> FetchResponse {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(url, e),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => FetchResponse::from_status(status, String::from_utf8_lossy(&bytes)),
            Err(e) => transport_failure(url, e),
        }
    }
}

#[async_trait::async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> FetchResponse {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target_host = %target_host(url), "GET cancelled");
                FetchResponse::transport_failure("request cancelled")
            }
            response = self.fetch(url) => response,
        }
    }
}

fn transport_failure(url: &str, error: reqwest::Error) -> FetchResponse {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "failed"
    };
    let error = error.without_url();

    tracing::debug!(target_host = %target_host(url), error = %error, "GET {}", kind);
    FetchResponse::transport_failure(format!("GET {}: {}", kind, error))
}

/// Host part of `url`, safe to log
fn target_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid url>".to_string())
}
