//! Host monitoring loop
//!
//! The [`Monitor`] owns the host records and is the only code that mutates
//! their scheduling state. Each tick it:
//! - Checks every due host against its published A records
//! - Pushes an update for hosts whose record is stale
//! - Reschedules hosts from the record TTL
//! - Polls the public IP once and arms every host when it changed
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │   Monitor    │── MonitorEvent ──▶ (observers)
//!                  └──────────────┘
//!                         │
//!     ┌───────────────────┼────────────────────┐
//!     ▼                   ▼                    ▼
//! ┌─────────────┐  ┌──────────────┐   ┌─────────────────┐
//! │ DnsResolver │  │ HttpFetcher  │   │ UpdateValidator │
//! │ (A records) │  │ (update/IP)  │   │ (acknowledgment)│
//! └─────────────┘  └──────────────┘   └─────────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. For each host in configured order: resolve, compare, update if stale
//! 2. Poll the discovery endpoint
//! 3. On a new public IP, arm every host for the next tick
//!
//! Hosts are processed sequentially, so at most one request is in flight.

use crate::config::{MonitorConfig, MonitorSettings};
use crate::error::{Error, Result};
use crate::host::HostRecord;
use crate::traits::{DnsRecord, DnsResolver, HttpFetcher, UpdateValidator, Validation};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// TTL reported when no record matched the host name
pub const UNKNOWN_TTL: i64 = -1;

/// Events emitted by the Monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Monitor started
    Started { hosts_count: usize },

    /// Published record already matches, host is idle until `next_check`
    HostCurrent {
        host: String,
        ip: IpAddr,
        next_check: DateTime<Utc>,
    },

    /// DNS answer had no record for the host name
    RecordMissing { host: String, records_returned: usize },

    /// Resolver failed, host skipped this tick
    ResolveFailed { host: String, error: String },

    /// Provider confirmed the update
    UpdateSucceeded { host: String, ip: IpAddr, status: u16 },

    /// Update failed in transport or validation, retried next tick
    UpdateFailed {
        host: String,
        ip: IpAddr,
        status: u16,
        reason: String,
    },

    /// Discovery endpoint failed or returned something that isn't an address
    DiscoveryFailed { status: u16, body: String },

    /// Public IP changed (or was discovered for the first time)
    PublicIpChanged {
        previous: Option<IpAddr>,
        current: IpAddr,
    },

    /// Monitor stopped
    Stopped { reason: String },
}

/// Result of scanning a DNS answer for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordScan {
    /// A matching record already holds the target address
    current: bool,
    /// Largest TTL of the matching IPv4 records, [`UNKNOWN_TTL`] if none
    ttl: i64,
}

fn scan_records(host: &HostRecord, target: IpAddr, records: &[DnsRecord]) -> RecordScan {
    records
        .iter()
        .filter(|record| host.matches_name(&record.name))
        .fold(
            RecordScan {
                current: false,
                ttl: UNKNOWN_TTL,
            },
            |mut scan, record| {
                if record.address.is_ipv4() {
                    scan.ttl = scan.ttl.max(i64::from(record.ttl));
                }
                scan.current |= record.address == target;
                scan
            },
        )
}

/// Per-host monitoring and update scheduler
///
/// ## Lifecycle
///
/// 1. Create with [`Monitor::new()`] (validates configuration, fail-fast)
/// 2. Start with [`Monitor::run()`]
/// 3. Runs until the cancellation token fires
///
/// ## Threading
///
/// All ticks run on the caller's task; no two ticks overlap and no state is
/// shared, so host records need no locking.
pub struct Monitor {
    resolver: Box<dyn DnsResolver>,
    fetcher: Box<dyn HttpFetcher>,
    validator: Box<dyn UpdateValidator>,

    /// Hosts in configured order
    hosts: Vec<HostRecord>,

    settings: MonitorSettings,

    /// Most recently discovered public IP
    last_known_ip: Option<IpAddr>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<MonitorEvent>,
}

impl Monitor {
    /// Create a new monitor
    ///
    /// # Parameters
    ///
    /// - `config`: Monitor configuration, validated here
    /// - `resolver`: DNS resolver bound to the configured server
    /// - `fetcher`: HTTP client for updates and discovery
    /// - `validator`: Acknowledgment validator of the update provider
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, event_receiver), or `Error::Config` if any host
    /// entry is invalid. No partial monitor is ever built.
    pub fn new(
        config: &MonitorConfig,
        resolver: Box<dyn DnsResolver>,
        fetcher: Box<dyn HttpFetcher>,
        validator: Box<dyn UpdateValidator>,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        Self::with_settings(config, config.settings(), resolver, fetcher, validator)
    }

    /// Create a monitor from already resolved `settings`
    ///
    /// Lets a caller that built its collaborators from
    /// [`MonitorConfig::settings()`] reuse them instead of resolving twice.
    pub fn with_settings(
        config: &MonitorConfig,
        settings: MonitorSettings,
        resolver: Box<dyn DnsResolver>,
        fetcher: Box<dyn HttpFetcher>,
        validator: Box<dyn UpdateValidator>,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        config.validate()?;
        let hosts = config.build_hosts()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let monitor = Self {
            resolver,
            fetcher,
            validator,
            hosts,
            settings,
            last_known_ip: None,
            event_tx: tx,
        };

        Ok((monitor, rx))
    }

    /// Host records in configured order
    pub fn hosts(&self) -> &[HostRecord] {
        &self.hosts
    }

    /// Most recently discovered public IP
    pub fn last_known_ip(&self) -> Option<IpAddr> {
        self.last_known_ip
    }

    /// Resolved global settings the monitor runs with
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run the monitor until `cancel` fires
    ///
    /// Waits one refresh interval before every tick. The wait and every
    /// network call inside a tick observe `cancel`, so shutdown is bounded
    /// by the slowest in-flight request, not by the tick period.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.emit_event(MonitorEvent::Started {
            hosts_count: self.hosts.len(),
        });
        info!(
            hosts = self.hosts.len(),
            dns_server = %self.settings.dns_server,
            provider = self.validator.provider_name(),
            interval = ?self.settings.ip_refresh_interval,
            "Monitoring started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.ip_refresh_interval) => {}
            }

            self.tick(&cancel).await;
        }

        info!("Shutdown signal received, monitor stopped");
        self.emit_event(MonitorEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Run one tick against the wall clock
    pub async fn tick(&mut self, cancel: &CancellationToken) {
        self.tick_at(Utc::now(), cancel).await;
    }

    /// Run one tick with `now` as the clock reading for all scheduling
    pub async fn tick_at(&mut self, now: DateTime<Utc>, cancel: &CancellationToken) {
        // Each host is checked on an owned copy and written back once done, so
        // dropping this future mid-tick leaves every host in a consistent state
        for index in 0..self.hosts.len() {
            if cancel.is_cancelled() {
                break;
            }
            let mut host = self.hosts[index].clone();
            self.check_host(&mut host, now, cancel).await;
            self.hosts[index] = host;
        }

        if cancel.is_cancelled() {
            debug!("Tick interrupted by shutdown");
            return;
        }

        self.poll_public_ip(now, cancel).await;
    }

    /// Verify one host and push an update when its record is stale
    async fn check_host(
        &self,
        host: &mut HostRecord,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) {
        let Some(target) = host.target_ip(now, self.last_known_ip) else {
            return;
        };

        let records = match self.resolver.resolve_a(host.full_name(), cancel).await {
            Ok(records) => records,
            Err(Error::Cancelled) => return,
            Err(e) => {
                error!(
                    host = host.full_name(),
                    dns_server = %self.resolver.server(),
                    error = %e,
                    "DNS query failed"
                );
                self.emit_event(MonitorEvent::ResolveFailed {
                    host: host.full_name().to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let scan = scan_records(host, target, &records);

        // Bootstrap case (never published) and misconfiguration look the
        // same here; both fall through to an update attempt.
        if scan.ttl == UNKNOWN_TTL {
            warn!(
                host = host.full_name(),
                records = records.len(),
                "DNS query did not return an entry for host"
            );
            for record in &records {
                warn!(
                    name = %record.name,
                    address = %record.address,
                    ttl = record.ttl,
                    initial_ttl = record.initial_ttl,
                    record_class = %record.record_class,
                    record_type = %record.record_type,
                    "Returned record"
                );
            }
            self.emit_event(MonitorEvent::RecordMissing {
                host: host.full_name().to_string(),
                records_returned: records.len(),
            });
        }

        if scan.current {
            host.mark_current(now, self.settings.dns_refresh_interval_secs, scan.ttl);
            debug!(
                host = host.full_name(),
                ip = %target,
                next_check = %host.when_to_check,
                "DNS entry is current"
            );
            self.emit_event(MonitorEvent::HostCurrent {
                host: host.full_name().to_string(),
                ip: target,
                next_check: host.when_to_check,
            });
            return;
        }

        self.push_update(host, target, scan.ttl, now, cancel).await;
    }

    /// Send the update request and schedule from its outcome
    async fn push_update(
        &self,
        host: &mut HostRecord,
        target: IpAddr,
        ttl: i64,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) {
        let response = self.fetcher.get(&host.update_url_for(target), cancel).await;
        if cancel.is_cancelled() {
            return;
        }

        let outcome = if response.success {
            self.validator.validate(target, &response.body)
        } else {
            Validation::rejected(format!("HTTP request failed with status {}", response.status))
        };

        match outcome.into_result() {
            Ok(()) => {
                info!(
                    host = host.full_name(),
                    ip = %target,
                    status = response.status,
                    body = %response.body,
                    "Updated DNS entry"
                );
                host.mark_updated(now, self.settings.dns_refresh_interval_secs, ttl);
                self.emit_event(MonitorEvent::UpdateSucceeded {
                    host: host.full_name().to_string(),
                    ip: target,
                    status: response.status,
                });
            }
            Err(e) => {
                error!(
                    host = host.full_name(),
                    ip = %target,
                    status = response.status,
                    body = %response.body,
                    error = %e,
                    "Failed to update DNS entry"
                );
                host.mark_failed(now);
                self.emit_event(MonitorEvent::UpdateFailed {
                    host: host.full_name().to_string(),
                    ip: target,
                    status: response.status,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Poll the discovery endpoint and arm every host on a change
    async fn poll_public_ip(&mut self, now: DateTime<Utc>, cancel: &CancellationToken) {
        let response = self
            .fetcher
            .get(&self.settings.ip_address_provider, cancel)
            .await;
        if cancel.is_cancelled() {
            return;
        }

        let discovered = response
            .success
            .then(|| response.body.trim().parse::<IpAddr>().ok())
            .flatten();

        let Some(current) = discovered else {
            warn!(
                status = response.status,
                body = %response.body,
                "Failed to get current IP address"
            );
            self.emit_event(MonitorEvent::DiscoveryFailed {
                status: response.status,
                body: response.body,
            });
            return;
        };

        let previous = self.last_known_ip;
        if previous == Some(current) {
            return;
        }

        match previous {
            Some(previous) => info!("IP address changed from {} to {}", previous, current),
            None => info!("Public IP address is {}", current),
        }
        self.emit_event(MonitorEvent::PublicIpChanged { previous, current });

        self.last_known_ip = Some(current);
        // A global change overrides any TTL-based deferral
        for host in &mut self.hosts {
            host.arm(current, now);
        }
    }

    /// Emit a monitor event
    fn emit_event(&self, event: MonitorEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
        }
    }
}
