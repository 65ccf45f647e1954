// # Uncached DNS Resolver
//
// This crate provides the `DnsResolver` used by the monitor to read the A
// records currently published for each host.
//
// ## Behavior
//
// - Queries exactly one configured server over UDP/TCP port 53
// - Response caching is disabled: every call reaches the server, so a
//   freshly pushed update is visible on the next check
// - No search domains: names are queried as fully qualified
// - A name with no A records answers with an empty record list, which the
//   monitor treats as a stale record
//
// ## Cancellation
//
// A query in flight is abandoned as soon as the token fires and the call
// returns `Error::Cancelled`.

use dnsmon_core::traits::{DnsRecord, DnsResolver};
use dnsmon_core::{Error, Result};

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::{RData, Record, RecordType};
use hickory_resolver::{ResolveError, TokioResolver};

use std::net::IpAddr;

use tokio_util::sync::CancellationToken;

/// Standard DNS port
const DNS_PORT: u16 = 53;

/// Resolver querying a single server with caching disabled
pub struct HickoryResolver {
    server: IpAddr,
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Create a resolver for `server`
    pub fn new(server: IpAddr) -> Self {
        let name_servers = NameServerConfigGroup::from_ips_clear(&[server], DNS_PORT, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), name_servers);

        let mut options = ResolverOpts::default();
        options.cache_size = 0;

        let resolver = TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(options)
            .build();

        Self { server, resolver }
    }

    async fn lookup(&self, name: &str) -> Result<Vec<DnsRecord>> {
        match self.resolver.lookup(fully_qualified(name), RecordType::A).await {
            Ok(lookup) => Ok(lookup.records().iter().filter_map(to_dns_record).collect()),
            Err(e) if is_empty_answer(&e) => {
                tracing::debug!(name, error = %e, "No A records published");
                Ok(Vec::new())
            }
            Err(e) => Err(Error::resolver(format!(
                "A query for {} via {} failed: {}",
                name, self.server, e
            ))),
        }
    }
}

#[async_trait::async_trait]
impl DnsResolver for HickoryResolver {
    async fn resolve_a(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<DnsRecord>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            records = self.lookup(name) => records,
        }
    }

    fn server(&self) -> IpAddr {
        self.server
    }
}

/// `name` with a trailing dot so no search domain is ever appended
fn fully_qualified(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// NXDOMAIN and NODATA both surface as "no records found"
fn is_empty_answer(error: &ResolveError) -> bool {
    error.is_no_records_found()
}

fn to_dns_record(record: &Record) -> Option<DnsRecord> {
    let address = match record.data() {
        RData::A(a) => IpAddr::V4(a.0),
        RData::AAAA(aaaa) => IpAddr::V6(aaaa.0),
        // CNAME links in the answer chain carry no address
        _ => return None,
    };

    Some(DnsRecord {
        name: record.name().to_string(),
        address,
        ttl: record.ttl(),
        // Uncached answers come straight from the server
        initial_ttl: record.ttl(),
        record_class: record.dns_class().to_string(),
        record_type: record.record_type().to_string(),
    })
}
