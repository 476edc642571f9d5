//! Validation policies for admission webhooks.
//!
//! Policies run in a fixed order and the first denial wins; later policies
//! are not evaluated. A policy returning an error aborts validation entirely,
//! which callers must report differently from a denial.

pub mod name;

use kube::Resource;
use tracing::debug;

use crate::config::AdmissionConfig;
use crate::webhooks::display_name;
use crate::webhooks::error::Result;

pub use name::DisallowedName;

/// Result of a validation check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Human readable explanation
    pub reason: String,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

/// A side-effect free predicate over a resource
pub trait Validation<K>: Send + Sync {
    /// Stable name used in logs and errors
    fn name(&self) -> &'static str;

    /// Evaluate the resource. `Err` means the resource could not be evaluated.
    fn validate(&self, resource: &K) -> Result<ValidationResult>;
}

/// Ordered list of validation policies
pub struct ValidationPipeline<K> {
    policies: Vec<Box<dyn Validation<K>>>,
}

impl<K: Resource> ValidationPipeline<K> {
    pub fn new(policies: Vec<Box<dyn Validation<K>>>) -> Self {
        Self { policies }
    }

    /// Names of the policies in evaluation order
    pub fn names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// Run all validation policies, stopping at the first denial
    pub fn validate_all(&self, resource: &K) -> Result<ValidationResult> {
        for policy in &self.policies {
            let result = policy.validate(resource)?;
            debug!(
                name = %display_name(resource),
                policy = policy.name(),
                allowed = result.allowed,
                "Evaluated policy"
            );
            if !result.allowed {
                return Ok(result);
            }
        }

        Ok(ValidationResult::allowed("all policies passed"))
    }
}

/// Policies applied to every admitted kind, in order
pub fn default_validations<K>(config: &AdmissionConfig) -> ValidationPipeline<K>
where
    K: Resource<DynamicType = ()>,
{
    ValidationPipeline::new(vec![Box::new(DisallowedName::new(config))])
}
