//! Admission webhooks for pods and nodes.
//!
//! Mutating webhooks run an ordered [`mutations::MutationPipeline`] and answer
//! with a JSON patch; validating webhooks run an ordered
//! [`policies::ValidationPipeline`] and answer with the first denial.

pub mod admission;
pub mod error;
pub mod mutations;
pub mod patch;
pub mod policies;
mod server;

use kube::Resource;

pub use admission::{Admitter, Decision, Verdict, node_admitter, pod_admitter};
pub use error::{Error, Result};
pub use policies::{ValidationPipeline, ValidationResult};
pub use server::{WebhookError, WebhookState, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};

/// Name used in logs: the object name, or its `generateName` prefix for
/// objects the API server has not named yet.
pub(crate) fn display_name<K: Resource>(resource: &K) -> &str {
    let meta = resource.meta();
    match meta.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => meta.generate_name.as_deref().unwrap_or_default(),
    }
}
