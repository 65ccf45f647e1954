//! Core traits for the DNS monitor
//!
//! This module defines the abstract interfaces of the monitor's collaborators.
//!
//! - [`DnsResolver`]: Query published A records, uncached
//! - [`HttpFetcher`]: GET with cancellation and uniform success classification
//! - [`UpdateValidator`]: Check an update provider's acknowledgment

pub mod http_fetch;
pub mod resolver;
pub mod validator;

pub use http_fetch::{FetchResponse, HttpFetcher, is_success_status};
pub use resolver::{DnsRecord, DnsResolver};
pub use validator::{UpdateValidator, UpdateValidatorFactory, Validation};
