//! Mutation rules and the pipeline that chains them.
//!
//! Rules never touch their input: each one returns a modified copy, so the
//! pipeline can diff the untouched original against the final result.

pub mod inject_env;
pub mod lifespan_taint;
pub mod lifespan_tolerations;

use std::num::IntErrorKind;

use json_patch::Patch;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Resource;
use serde::Serialize;
use tracing::debug;

use crate::config::AdmissionConfig;
use crate::webhooks::display_name;
use crate::webhooks::error::Result;
use crate::webhooks::patch::diff_resources;

pub use inject_env::InjectEnv;
pub use lifespan_taint::LifespanTaint;
pub use lifespan_tolerations::LifespanTolerations;

/// Toleration operator matching any taint value
pub const OPERATOR_EXISTS: &str = "Exists";
/// Toleration operator matching one taint value
pub const OPERATOR_EQUAL: &str = "Equal";
/// Taint effect used for lifespan scheduling constraints
pub const EFFECT_NO_SCHEDULE: &str = "NoSchedule";

/// A single rule computing a change to a resource
pub trait Mutation<K>: Send + Sync {
    /// Stable name used in logs and errors
    fn name(&self) -> &'static str;

    /// Return a mutated copy of `resource`
    fn mutate(&self, resource: &K) -> Result<K>;
}

/// Ordered list of mutation rules applied to one resource.
pub struct MutationPipeline<K> {
    mutations: Vec<Box<dyn Mutation<K>>>,
}

impl<K> MutationPipeline<K>
where
    K: Resource + Clone + Serialize,
{
    pub fn new(mutations: Vec<Box<dyn Mutation<K>>>) -> Self {
        Self { mutations }
    }

    /// Names of the rules in application order
    pub fn names(&self) -> Vec<&'static str> {
        self.mutations.iter().map(|m| m.name()).collect()
    }

    /// Run every rule over a copy of `resource`, feeding each rule the
    /// previous rule's output. The first failing rule aborts the run.
    pub fn apply(&self, resource: &K) -> Result<K> {
        let name = display_name(resource);
        let mut mutated = resource.clone();
        for mutation in &self.mutations {
            debug!(name = %name, mutation = mutation.name(), "Applying mutation");
            mutated = mutation.mutate(&mutated)?;
        }
        Ok(mutated)
    }

    /// Run the pipeline and describe the result as a JSON patch against
    /// the original resource.
    pub fn patch(&self, resource: &K) -> Result<Patch> {
        let mutated = self.apply(resource)?;
        diff_resources(resource, &mutated)
    }
}

/// Rules applied to pods, in order
pub fn pod_mutations(config: &AdmissionConfig) -> MutationPipeline<Pod> {
    MutationPipeline::new(vec![
        Box::new(LifespanTolerations::new(config)),
        Box::new(InjectEnv::new(config)),
    ])
}

/// Rules applied to nodes, in order
pub fn node_mutations(config: &AdmissionConfig) -> MutationPipeline<Node> {
    MutationPipeline::new(vec![Box::new(LifespanTaint::new(config))])
}

/// Append each wanted entry not already present in `existing`.
///
/// Presence is full structural equality, so applying the same set twice
/// leaves the list unchanged. Returns how many entries were appended.
pub fn append_missing<T: PartialEq>(existing: &mut Vec<T>, wanted: Vec<T>) -> usize {
    let mut appended = 0;
    for entry in wanted {
        if !existing.contains(&entry) {
            existing.push(entry);
            appended += 1;
        }
    }
    appended
}

/// Parse a day count label value.
///
/// Only non-negative decimal integers are accepted. Counts too large for
/// `u64` saturate, since they exceed any configurable maximum anyway.
pub(crate) fn parse_days(rule: &'static str, label: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(days) => Ok(days),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u64::MAX),
        Err(e) => Err(crate::webhooks::Error::rule(
            rule,
            format!(
                "label {} value {:?} is not a non-negative integer: {}",
                label, value, e
            ),
        )),
    }
}
