// # Update Validator Trait
//
// Decides whether an update provider's acknowledgment confirms the update.
// Keeping this behind a trait lets the monitor work with any provider whose
// endpoint is a plain GET with the address in the URL.
//
// ## Implementations
//
// - Namecheap XML acknowledgment: `dnsmon-provider-namecheap` crate

use std::net::IpAddr;

/// Result of validating an acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The provider confirmed the requested address
    Accepted,
    /// The acknowledgment was malformed or reported a failure
    Rejected {
        /// Human-readable reason naming the offending field
        reason: String,
    },
}

impl Validation {
    /// Create a rejection
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Convert into a `Result` for `?`-style callers
    pub fn into_result(self) -> Result<(), crate::Error> {
        match self {
            Self::Accepted => Ok(()),
            Self::Rejected { reason } => Err(crate::Error::validation(reason)),
        }
    }
}

/// Trait for provider acknowledgment validators
///
/// Validators are pure: no I/O, no state. Parse failures of any kind are a
/// [`Validation::Rejected`], never a panic or an error.
pub trait UpdateValidator: Send + Sync {
    /// Validate `body` as the acknowledgment of publishing `requested_ip`
    fn validate(&self, requested_ip: IpAddr, body: &str) -> Validation;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing validators by provider name
pub trait UpdateValidatorFactory: Send + Sync {
    /// Create a validator instance
    fn create(&self) -> Box<dyn UpdateValidator>;
}
