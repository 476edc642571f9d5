//! Environment injection into every container of a pod.

use k8s_openapi::api::core::v1::{Container, EnvVar, Pod};
use tracing::debug;

use super::Mutation;
use crate::config::AdmissionConfig;
use crate::webhooks::display_name;
use crate::webhooks::error::Result;

/// Rule name
pub const NAME: &str = "inject_env";

/// Ensures a fixed set of env vars exists in containers and init containers.
///
/// A container that already declares a variable with the same name is left
/// alone, whatever that variable's value is.
#[derive(Clone, Debug)]
pub struct InjectEnv {
    vars: Vec<EnvVar>,
}

impl InjectEnv {
    pub fn new(config: &AdmissionConfig) -> Self {
        let (name, value) = &config.injected_env;
        Self::with_vars(vec![EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        }])
    }

    pub fn with_vars(vars: Vec<EnvVar>) -> Self {
        Self { vars }
    }
}

/// Check whether the container declares a variable with this name
pub fn has_env_var(container: &Container, name: &str) -> bool {
    container
        .env
        .as_ref()
        .is_some_and(|env| env.iter().any(|var| var.name == name))
}

impl Mutation<Pod> for InjectEnv {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mutate(&self, pod: &Pod) -> Result<Pod> {
        let mut mutated = pod.clone();
        let Some(spec) = mutated.spec.as_mut() else {
            return Ok(mutated);
        };

        let containers = spec
            .containers
            .iter_mut()
            .chain(spec.init_containers.iter_mut().flatten());
        for container in containers {
            for var in &self.vars {
                if has_env_var(container, &var.name) {
                    continue;
                }
                debug!(
                    pod_name = %display_name(pod),
                    container = %container.name,
                    env = %var.name,
                    "Injecting env var"
                );
                container.env.get_or_insert_with(Vec::new).push(var.clone());
            }
        }

        Ok(mutated)
    }
}
