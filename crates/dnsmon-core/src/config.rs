//! Configuration types for the DNS monitor
//!
//! This module defines the configuration consumed by the monitor, the
//! environment overrides applied on top of a config file, and the startup
//! validation that turns host entries into [`HostRecord`]s.

use crate::error::{Error, Result};
use crate::host::HostRecord;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::warn;

/// Resolver used when none (or an unparsable one) is configured
pub const DEFAULT_DNS_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Public IP discovery endpoint used when none is configured
pub const DEFAULT_IP_ADDRESS_PROVIDER: &str = "https://api.ipify.org/";

/// Longest accepted refresh interval, the range of a DNS TTL
pub const MAX_REFRESH_INTERVAL_SECS: u64 = u32::MAX as u64;

/// Validator used when none is configured
pub const DEFAULT_PROVIDER: &str = "namecheap";

/// Main monitor configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Resolver address queried for host records
    #[serde(default)]
    pub dns_server: Option<String>,

    /// URL returning the caller's public IP as plain text
    #[serde(default)]
    pub ip_address_provider: Option<String>,

    /// Seconds between ticks (and public IP discovery polls)
    #[serde(default = "default_ip_refresh_interval_secs")]
    pub ip_refresh_interval_secs: u64,

    /// Lower bound in seconds for re-check scheduling
    #[serde(default = "default_dns_refresh_interval_secs")]
    pub dns_refresh_interval_secs: u64,

    /// Global update URL template with `{host}`, `{domain}`, `{password}`
    /// and `{ip}` tokens
    #[serde(default)]
    pub update_url_template: Option<String>,

    /// Domain used to synthesize full names and update URLs
    #[serde(default)]
    pub domain: Option<String>,

    /// Update provider password
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: Option<String>,

    /// Name of the registered update validator
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Per-request timeout for the HTTP client
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the monitor event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Hosts to keep in sync, processed in this order
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl MonitorConfig {
    /// Create a new configuration with defaults and no hosts
    pub fn new() -> Self {
        Self {
            dns_server: None,
            ip_address_provider: None,
            ip_refresh_interval_secs: default_ip_refresh_interval_secs(),
            dns_refresh_interval_secs: default_dns_refresh_interval_secs(),
            update_url_template: None,
            domain: None,
            password: None,
            provider: default_provider(),
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            hosts: Vec::new(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply `DNSMON_*` overrides from `lookup` (usually `std::env::var`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DNSMON_DNS_SERVER") {
            self.dns_server = Some(v);
        }
        if let Some(v) = lookup("DNSMON_IP_ADDRESS_PROVIDER") {
            self.ip_address_provider = Some(v);
        }
        if let Some(v) = lookup("DNSMON_IP_REFRESH_INTERVAL") {
            self.ip_refresh_interval_secs = parse_secs("DNSMON_IP_REFRESH_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("DNSMON_DNS_REFRESH_INTERVAL") {
            self.dns_refresh_interval_secs = parse_secs("DNSMON_DNS_REFRESH_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("DNSMON_UPDATE_URL") {
            self.update_url_template = Some(v);
        }
        if let Some(v) = lookup("DNSMON_DOMAIN") {
            self.domain = Some(v);
        }
        if let Some(v) = lookup("DNSMON_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = lookup("DNSMON_PROVIDER") {
            self.provider = v;
        }
        Ok(())
    }

    /// Validate the global settings
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(Error::config("No hosts configured"));
        }
        if self.ip_refresh_interval_secs == 0 {
            return Err(Error::config("IP refresh interval must be > 0"));
        }
        if self.dns_refresh_interval_secs == 0 {
            return Err(Error::config("DNS refresh interval must be > 0"));
        }
        if self.ip_refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(Error::config(format!(
                "IP refresh interval must be <= {MAX_REFRESH_INTERVAL_SECS} seconds"
            )));
        }
        if self.dns_refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(Error::config(format!(
                "DNS refresh interval must be <= {MAX_REFRESH_INTERVAL_SECS} seconds"
            )));
        }
        if self.provider.trim().is_empty() {
            return Err(Error::config("Update provider name cannot be empty"));
        }
        Ok(())
    }

    /// Validate every host entry and synthesize missing names and URLs
    ///
    /// Fails on the first invalid host: a partial configuration is a
    /// configuration error, not a reason to monitor a subset.
    pub fn build_hosts(&self) -> Result<Vec<HostRecord>> {
        let template = non_empty(&self.update_url_template);
        let domain = non_empty(&self.domain);
        let password = non_empty(&self.password);

        self.hosts
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let host = entry.host.as_str();
                if host.trim().is_empty() {
                    return Err(Error::config(format!(
                        "hosts[{index}]: host label is required"
                    )));
                }

                let update_url = match non_empty(&entry.update_url) {
                    Some(url) => url.to_string(),
                    None => match (template, domain, password) {
                        (Some(template), Some(domain), Some(password)) => template
                            .replace("{host}", host)
                            .replace("{domain}", domain)
                            .replace("{password}", password),
                        _ => {
                            return Err(Error::config(format!(
                                "host '{host}': no update_url and update_url_template, \
                                 domain or password is missing"
                            )));
                        }
                    },
                };

                let full_name = match (non_empty(&entry.full_name), domain) {
                    (Some(name), _) => name.to_string(),
                    (None, Some(domain)) => format!("{host}.{domain}"),
                    (None, None) => {
                        return Err(Error::config(format!(
                            "host '{host}': no full_name and domain is missing"
                        )));
                    }
                };

                Ok(HostRecord::new(host, full_name, update_url))
            })
            .collect()
    }

    /// Resolved global settings for the monitor loop
    pub fn settings(&self) -> MonitorSettings {
        let dns_server = match non_empty(&self.dns_server) {
            None => DEFAULT_DNS_SERVER,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(dns_server = raw, "Invalid DNS server, using {}", DEFAULT_DNS_SERVER);
                DEFAULT_DNS_SERVER
            }),
        };

        MonitorSettings {
            dns_server,
            ip_address_provider: non_empty(&self.ip_address_provider)
                .unwrap_or(DEFAULT_IP_ADDRESS_PROVIDER)
                .to_string(),
            ip_refresh_interval: Duration::from_secs(self.ip_refresh_interval_secs),
            dns_refresh_interval_secs: i64::try_from(
                self.dns_refresh_interval_secs.min(MAX_REFRESH_INTERVAL_SECS),
            )
            .unwrap_or(i64::from(u32::MAX)),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Hides the password
impl std::fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("dns_server", &self.dns_server)
            .field("ip_address_provider", &self.ip_address_provider)
            .field("ip_refresh_interval_secs", &self.ip_refresh_interval_secs)
            .field("dns_refresh_interval_secs", &self.dns_refresh_interval_secs)
            .field("update_url_template", &self.update_url_template)
            .field("domain", &self.domain)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("provider", &self.provider)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("hosts", &self.hosts)
            .finish()
    }
}

/// One configured host entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Short host label, required
    #[serde(default)]
    pub host: String,

    /// Fully-qualified name, defaults to `host.domain`
    #[serde(default)]
    pub full_name: Option<String>,

    /// Explicit update URL, defaults to the global template
    #[serde(default)]
    pub update_url: Option<String>,
}

impl HostConfig {
    /// Create a host entry relying on the global template and domain
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            full_name: None,
            update_url: None,
        }
    }

    /// Set an explicit full DNS name
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Set an explicit update URL
    pub fn with_update_url(mut self, update_url: impl Into<String>) -> Self {
        self.update_url = Some(update_url.into());
        self
    }
}

/// Global scheduler settings derived from [`MonitorConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub dns_server: IpAddr,
    pub ip_address_provider: String,
    pub ip_refresh_interval: Duration,
    pub dns_refresh_interval_secs: i64,
    pub http_timeout: Duration,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} must be a number of seconds, got '{value}'")))
}

fn default_ip_refresh_interval_secs() -> u64 {
    60
}

fn default_dns_refresh_interval_secs() -> u64 {
    3600
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
