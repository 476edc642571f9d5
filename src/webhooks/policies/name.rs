//! Resource name policy.
//!
//! Rejects resources whose name contains the configured disallowed substring.

use kube::Resource;

use super::{Validation, ValidationResult};
use crate::config::AdmissionConfig;
use crate::webhooks::error::Result;

/// Policy name
pub const NAME: &str = "name_validator";

#[derive(Clone, Debug)]
pub struct DisallowedName {
    substring: String,
}

impl DisallowedName {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            substring: config.disallowed_name.clone(),
        }
    }
}

impl<K: Resource<DynamicType = ()>> Validation<K> for DisallowedName {
    fn name(&self) -> &'static str {
        NAME
    }

    fn validate(&self, resource: &K) -> Result<ValidationResult> {
        // An empty substring would match every name
        if self.substring.is_empty() {
            return Ok(ValidationResult::allowed("valid name"));
        }

        let name = resource.meta().name.as_deref().unwrap_or_default();
        if name.contains(&self.substring) {
            return Ok(ValidationResult::denied(&format!(
                "{} name contains {:?}",
                K::kind(&()).to_lowercase(),
                self.substring
            )));
        }

        Ok(ValidationResult::allowed("valid name"))
    }
}
