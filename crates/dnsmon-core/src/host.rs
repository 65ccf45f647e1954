//! Host records: per-host configuration plus live scheduling state
//!
//! A host is either *idle* (`ip_to_check` is `None`) or *armed* (it holds the
//! address to verify or push at its next due time). Only the monitor loop
//! mutates the scheduling fields.

use chrono::{DateTime, Duration, Utc};
use std::net::IpAddr;

/// Substitution token replaced by the pushed address in update URLs
pub const IP_TOKEN: &str = "{ip}";

/// One DNS name being kept in sync with the public IP
#[derive(Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Short host label (e.g. "www")
    host: String,

    /// Fully-qualified DNS name to query (e.g. "www.example.com")
    full_name: String,

    /// Update URL template, `{ip}` is substituted before use.
    /// Usually carries a password, never log it.
    update_url: String,

    /// Address this host is due to be verified/updated against
    pub ip_to_check: Option<IpAddr>,

    /// The host is only processed once this time has passed (idle hosts)
    pub when_to_check: DateTime<Utc>,

    /// Time of the last successful update
    pub last_update: Option<DateTime<Utc>>,
}

impl HostRecord {
    /// Create an idle host record that is immediately due
    pub fn new(
        host: impl Into<String>,
        full_name: impl Into<String>,
        update_url: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            full_name: full_name.into(),
            update_url: update_url.into(),
            ip_to_check: None,
            when_to_check: DateTime::<Utc>::MIN_UTC,
            last_update: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Whether the host currently holds an address to verify
    pub fn is_armed(&self) -> bool {
        self.ip_to_check.is_some()
    }

    /// Address to verify this tick, if any
    ///
    /// Armed hosts are always processed. Idle hosts fall back to the last known
    /// public address once their scheduled check time has passed.
    pub fn target_ip(&self, now: DateTime<Utc>, last_known: Option<IpAddr>) -> Option<IpAddr> {
        match self.ip_to_check {
            Some(ip) => Some(ip),
            None if self.when_to_check < now => last_known,
            None => None,
        }
    }

    /// Update URL with `{ip}` replaced by the address being pushed
    pub fn update_url_for(&self, ip: IpAddr) -> String {
        self.update_url.replace(IP_TOKEN, &ip.to_string())
    }

    /// Whether a DNS answer name refers to this host
    ///
    /// Comparison ignores a trailing root dot and ASCII case.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.strip_suffix('.').unwrap_or(name);
        let full = self.full_name.strip_suffix('.').unwrap_or(&self.full_name);
        name.eq_ignore_ascii_case(full)
    }

    /// Disarm and schedule the next check `max(refresh_secs, ttl)` from now
    ///
    /// Saturates at [`DateTime::<Utc>::MAX_UTC`] instead of overflowing.
    pub fn mark_current(&mut self, now: DateTime<Utc>, refresh_secs: i64, ttl: i64) {
        self.ip_to_check = None;
        self.when_to_check = Duration::try_seconds(refresh_secs.max(ttl))
            .and_then(|wait| now.checked_add_signed(wait))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// A successful update also records the update time
    pub fn mark_updated(&mut self, now: DateTime<Utc>, refresh_secs: i64, ttl: i64) {
        self.mark_current(now, refresh_secs, ttl);
        self.last_update = Some(now);
    }

    /// Failed updates are retried on the very next tick, with no backoff
    pub fn mark_failed(&mut self, now: DateTime<Utc>) {
        self.when_to_check = now;
    }

    /// Force re-evaluation against `ip` on the next tick
    pub fn arm(&mut self, ip: IpAddr, now: DateTime<Utc>) {
        self.ip_to_check = Some(ip);
        self.when_to_check = now;
    }
}

// The update URL usually embeds the provider password
impl std::fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRecord")
            .field("host", &self.host)
            .field("full_name", &self.full_name)
            .field("update_url", &"<REDACTED>")
            .field("ip_to_check", &self.ip_to_check)
            .field("when_to_check", &self.when_to_check)
            .field("last_update", &self.last_update)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> HostRecord {
        HostRecord::new(
            "www",
            "www.example.com",
            "https://dyn.example/update?host=www&password=hunter2&ip={ip}",
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn new_records_are_idle_and_due() {
        let host = record();
        assert!(!host.is_armed());
        assert_eq!(host.last_update, None);
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(host.target_ip(t0(), Some(ip)), Some(ip));
        assert_eq!(host.target_ip(t0(), None), None);
    }

    #[test]
    fn idle_host_waits_for_schedule() {
        let mut host = record();
        host.mark_current(t0(), 3600, -1);
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert_eq!(host.target_ip(t0() + Duration::seconds(10), Some(ip)), None);
        assert_eq!(host.target_ip(t0() + Duration::seconds(3601), Some(ip)), Some(ip));
    }

    #[test]
    fn armed_host_ignores_schedule() {
        let mut host = record();
        let armed: IpAddr = "5.6.7.8".parse().unwrap();
        host.when_to_check = t0() + Duration::days(1);
        host.ip_to_check = Some(armed);
        assert_eq!(host.target_ip(t0(), Some("1.1.1.1".parse().unwrap())), Some(armed));
    }

    #[test]
    fn ttl_extends_refresh_interval() {
        let mut host = record();
        host.mark_current(t0(), 60, 7200);
        assert_eq!(host.when_to_check, t0() + Duration::seconds(7200));
        host.mark_current(t0(), 3600, 300);
        assert_eq!(host.when_to_check, t0() + Duration::seconds(3600));
    }

    #[test]
    fn repeated_current_marking_is_stable() {
        let mut host = record();
        host.mark_current(t0(), 3600, 600);
        let first = host.when_to_check;
        host.mark_current(t0(), 3600, 600);
        assert_eq!(host.when_to_check, first);
    }

    #[test]
    fn huge_interval_saturates_instead_of_overflowing() {
        let mut host = record();
        host.mark_current(t0(), i64::MAX, -1);
        assert_eq!(host.when_to_check, DateTime::<Utc>::MAX_UTC);
        assert!(!host.is_armed());

        host.mark_current(t0(), 10_000_000_000_000, -1);
        assert_eq!(host.when_to_check, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn arm_overrides_future_schedule() {
        let mut host = record();
        host.mark_updated(t0(), 3600, -1);
        assert_eq!(host.last_update, Some(t0()));
        let ip: IpAddr = "9.9.9.9".parse().unwrap();
        host.arm(ip, t0());
        assert_eq!(host.ip_to_check, Some(ip));
        assert_eq!(host.when_to_check, t0());
    }

    #[test]
    fn name_matching_ignores_case_and_root_dot() {
        let host = record();
        assert!(host.matches_name("WWW.Example.COM."));
        assert!(host.matches_name("www.example.com"));
        assert!(!host.matches_name("mail.example.com."));
    }

    #[test]
    fn update_url_substitutes_ip() {
        let host = record();
        let url = host.update_url_for("1.2.3.4".parse().unwrap());
        assert!(url.ends_with("&ip=1.2.3.4"));
    }

    #[test]
    fn debug_redacts_update_url() {
        let rendered = format!("{:?}", record());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<REDACTED>"));
    }
}
