//! Plugin-based validator registry
//!
//! The registry maps update provider names to validator factories so the
//! daemon can pick the acknowledgment format from configuration without a
//! hard-coded if-else chain.
//!
//! ## Registration
//!
//! Provider crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In dnsmon-provider-namecheap
//! pub fn register(registry: &ValidatorRegistry) {
//!     registry.register_validator("namecheap", Box::new(NamecheapFactory));
//! }
//! ```

use crate::error::{Error, Result};
use crate::traits::{UpdateValidator, UpdateValidatorFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of update validator factories
///
/// ## Thread Safety
///
/// Uses interior mutability with RwLock, allowing concurrent reads and
/// exclusive writes.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<String, Box<dyn UpdateValidatorFactory>>>,
}

impl ValidatorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator factory under a provider name
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_validator(
        &self,
        name: impl Into<String>,
        factory: Box<dyn UpdateValidatorFactory>,
    ) {
        let mut validators = self
            .validators
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        validators.insert(name.into(), factory);
    }

    /// Create the validator registered under `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn UpdateValidator>)`: Created validator instance
    /// - `Err(Error::Config)`: If no validator is registered under `name`
    pub fn create_validator(&self, name: &str) -> Result<Box<dyn UpdateValidator>> {
        let validators = self
            .validators
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = validators.get(name).ok_or_else(|| {
            let mut known: Vec<&str> = validators.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::config(format!(
                "Unknown update provider: {name} (registered: {})",
                known.join(", ")
            ))
        })?;

        Ok(factory.create())
    }

    /// List all registered provider names
    pub fn list_validators(&self) -> Vec<String> {
        let validators = self
            .validators
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        validators.keys().cloned().collect()
    }

    /// Check if a provider name is registered
    pub fn has_validator(&self, name: &str) -> bool {
        let validators = self
            .validators
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        validators.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Validation;
    use std::net::IpAddr;

    struct AcceptAll;

    impl UpdateValidator for AcceptAll {
        fn validate(&self, _requested_ip: IpAddr, _body: &str) -> Validation {
            Validation::Accepted
        }

        fn provider_name(&self) -> &'static str {
            "accept-all"
        }
    }

    struct AcceptAllFactory;

    impl UpdateValidatorFactory for AcceptAllFactory {
        fn create(&self) -> Box<dyn UpdateValidator> {
            Box::new(AcceptAll)
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ValidatorRegistry::new();

        assert!(!registry.has_validator("accept-all"));

        registry.register_validator("accept-all", Box::new(AcceptAllFactory));

        assert!(registry.has_validator("accept-all"));
        assert!(registry.list_validators().contains(&"accept-all".to_string()));

        let validator = registry.create_validator("accept-all").unwrap();
        assert_eq!(validator.provider_name(), "accept-all");
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let registry = ValidatorRegistry::new();
        registry.register_validator("accept-all", Box::new(AcceptAllFactory));

        let err = registry.create_validator("dyndns2").err().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("accept-all"));
    }
}
