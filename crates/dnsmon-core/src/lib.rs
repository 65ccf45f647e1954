// # dnsmon-core
//
// Core library for the dynamic DNS host monitor.
//
// ## Architecture Overview
//
// This library keeps one or more DNS host records pointed at the caller's
// public IP address:
// - **HostRecord**: Per-host configuration plus live scheduling state
// - **DnsResolver**: Trait for querying published A records (uncached)
// - **HttpFetcher**: Trait for GET requests with cancellation
// - **UpdateValidator**: Trait for checking an update provider's acknowledgment
// - **Monitor**: The tick loop that decides when to check and when to update
// - **ValidatorRegistry**: Plugin-based registry of update validators
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Scheduling logic is separate from I/O
// 2. **Fail-fast configuration**: One invalid host disables monitoring
// 3. **Transient errors never escape a tick**: they become scheduling decisions
// 4. **Explicit cancellation**: One token reaches every suspend point

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{HostConfig, MonitorConfig, MonitorSettings};
pub use engine::{Monitor, MonitorEvent};
pub use error::{Error, Result};
pub use host::HostRecord;
pub use registry::ValidatorRegistry;
pub use traits::{
    DnsRecord, DnsResolver, FetchResponse, HttpFetcher, UpdateValidator, UpdateValidatorFactory,
    Validation,
};
