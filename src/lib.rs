//! lifespan-webhook library crate
//!
//! Admission decisions for pods and nodes: lifespan tolerations and env
//! injection for pods, lifespan taints for nodes, and name validation for
//! both. The decision core in [`webhooks`] is synchronous and transport-free;
//! [`webhooks::run_webhook_server`] and [`health`] wrap it in HTTP.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::{AdmissionConfig, ConfigError};
pub use health::HealthState;
pub use webhooks::{WebhookError, run_webhook_server};
