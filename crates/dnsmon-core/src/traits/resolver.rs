// # DNS Resolver Trait
//
// Defines the interface for querying the currently published A records of a
// host.
//
// ## Implementations
//
// - hickory-resolver based: `dnsmon-resolver` crate
//
// ## Usage
//
// ```rust,ignore
// use dnsmon_core::DnsResolver;
// use tokio_util::sync::CancellationToken;
//
// let records = resolver.resolve_a("www.example.com", &CancellationToken::new()).await?;
// for record in records {
//     println!("{} -> {} (ttl {})", record.name, record.address, record.ttl);
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;

/// One address record from a DNS answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Owner name as returned by the server (may carry a trailing dot)
    pub name: String,
    /// Published address
    pub address: IpAddr,
    /// Remaining time-to-live in seconds
    pub ttl: u32,
    /// Time-to-live when the answer was received
    pub initial_ttl: u32,
    /// Record class (e.g. "IN")
    pub record_class: String,
    /// Record type (e.g. "A")
    pub record_type: String,
}

impl DnsRecord {
    /// Create an `IN A` record with identical remaining and initial TTL
    pub fn a(name: impl Into<String>, address: IpAddr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            address,
            ttl,
            initial_ttl: ttl,
            record_class: "IN".to_string(),
            record_type: "A".to_string(),
        }
    }
}

/// Trait for DNS resolver implementations
///
/// Implementations are bound to one upstream server at construction and
/// **must not cache**: every call goes to the wire, since a stale answer
/// would hide the very drift the monitor exists to detect.
///
/// Implementations must abandon the query as soon as `cancel` fires and
/// return [`crate::Error::Cancelled`].
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Query the A records published for `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: Every address record of the answer (possibly empty)
    /// - `Err(Error)`: Network failure, malformed response or cancellation
    async fn resolve_a(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Address of the upstream server (for logging)
    fn server(&self) -> IpAddr;
}
