//! Test doubles and common utilities for monitor contract tests
//!
//! Every double is a cheap `Clone` handle over shared state so a test can
//! hand one copy to the monitor and keep another for assertions.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use dnsmon_core::error::{Error, Result};
use dnsmon_core::traits::{DnsRecord, DnsResolver, FetchResponse, HttpFetcher, UpdateValidator, Validation};
use dnsmon_core::{HostConfig, MonitorConfig};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const DISCOVERY_URL: &str = "https://ip.example/";
pub const DOMAIN: &str = "example.com";

/// Update URL the monitor will request for `host` and `ip`
pub fn update_url(host: &str, ip: &str) -> String {
    format!("https://dyn.example/update?host={host}&domain={DOMAIN}&ip={ip}")
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// Fixed reference time for ticks
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Configuration for `hosts` under example.com with a 3600s refresh floor
pub fn config(hosts: &[&str]) -> MonitorConfig {
    MonitorConfig {
        ip_address_provider: Some(DISCOVERY_URL.to_string()),
        update_url_template: Some(
            "https://dyn.example/update?host={host}&domain={domain}&ip={ip}".to_string(),
        ),
        domain: Some(DOMAIN.to_string()),
        password: Some("pw".to_string()),
        dns_refresh_interval_secs: 3600,
        hosts: hosts.iter().map(|h| HostConfig::new(*h)).collect(),
        ..MonitorConfig::new()
    }
}

/// Resolver answering from a per-name script
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<String, std::result::Result<Vec<DnsRecord>, String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `name` with a single A record
    pub fn publish(&self, name: &str, address: &str, ttl: u32) {
        self.answer(name, vec![DnsRecord::a(format!("{name}."), ip(address), ttl)]);
    }

    pub fn answer(&self, name: &str, records: Vec<DnsRecord>) {
        self.answers
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(records));
    }

    pub fn fail(&self, name: &str, error: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(error.to_string()));
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsResolver for ScriptedResolver {
    async fn resolve_a(&self, name: &str, _cancel: &CancellationToken) -> Result<Vec<DnsRecord>> {
        self.queries.lock().unwrap().push(name.to_string());
        match self.answers.lock().unwrap().get(name) {
            Some(Ok(records)) => Ok(records.clone()),
            Some(Err(e)) => Err(Error::resolver(e.clone())),
            None => Ok(Vec::new()),
        }
    }

    fn server(&self) -> IpAddr {
        ip("192.0.2.53")
    }
}

/// Resolver that never answers until cancelled
#[derive(Clone, Default)]
pub struct HangingResolver;

#[async_trait::async_trait]
impl DnsResolver for HangingResolver {
    async fn resolve_a(&self, _name: &str, cancel: &CancellationToken) -> Result<Vec<DnsRecord>> {
        cancel.cancelled().await;
        Err(Error::Cancelled)
    }

    fn server(&self) -> IpAddr {
        ip("192.0.2.53")
    }
}

/// HTTP fetcher answering from a per-URL script
///
/// Unscripted URLs fail at the transport level.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    responses: Arc<Mutex<HashMap<String, FetchResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), FetchResponse::from_status(status, body));
    }

    /// Make the discovery endpoint report `address`
    pub fn discover(&self, address: &str) {
        self.respond(DISCOVERY_URL, 200, address);
    }

    /// Make the provider acknowledge updates of `host` to `address`
    pub fn acknowledge(&self, host: &str, address: &str) {
        self.respond(&update_url(host, address), 200, &format!("OK {address}"));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait::async_trait]
impl HttpFetcher for ScriptedFetcher {
    async fn get(&self, url: &str, _cancel: &CancellationToken) -> FetchResponse {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::transport_failure("connection refused"))
    }
}

/// Accepts bodies of the form `OK <requested ip>`
pub struct OkValidator;

impl UpdateValidator for OkValidator {
    fn validate(&self, requested_ip: IpAddr, body: &str) -> Validation {
        if body == format!("OK {requested_ip}") {
            Validation::Accepted
        } else {
            Validation::rejected(format!("unexpected acknowledgment: {body}"))
        }
    }

    fn provider_name(&self) -> &'static str {
        "ok"
    }
}

/// Build a monitor over scripted collaborators for `hosts`
pub fn build_monitor(
    hosts: &[&str],
    resolver: &ScriptedResolver,
    fetcher: &ScriptedFetcher,
) -> (
    dnsmon_core::Monitor,
    tokio::sync::mpsc::Receiver<dnsmon_core::MonitorEvent>,
) {
    dnsmon_core::Monitor::new(
        &config(hosts),
        Box::new(resolver.clone()),
        Box::new(fetcher.clone()),
        Box::new(OkValidator),
    )
    .expect("monitor construction succeeds")
}

/// Run the bootstrap tick at `t0()`: no host is checked yet, discovery
/// reports `address` and arms every host
pub async fn bootstrap(monitor: &mut dnsmon_core::Monitor, fetcher: &ScriptedFetcher, address: &str) {
    fetcher.discover(address);
    monitor.tick_at(t0(), &CancellationToken::new()).await;
    assert_eq!(monitor.last_known_ip(), Some(ip(address)));
}

/// Drain every event currently queued
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<dnsmon_core::MonitorEvent>) -> Vec<dnsmon_core::MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
