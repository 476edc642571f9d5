//! Lifespan taint for nodes.
//!
//! The node-side counterpart of [`LifespanTolerations`](super::LifespanTolerations):
//! a node labelled with its remaining lifespan in days gets a matching
//! `NoSchedule` taint under the same key, appended to whatever taints the
//! node already has.

use k8s_openapi::api::core::v1::{Node, Taint};
use kube::ResourceExt;
use tracing::info;

use super::{EFFECT_NO_SCHEDULE, Mutation, append_missing};
use crate::config::AdmissionConfig;
use crate::webhooks::error::Result;

/// Rule name
pub const NAME: &str = "lifespan_taint";

#[derive(Clone, Debug)]
pub struct LifespanTaint {
    taint_key: String,
}

impl LifespanTaint {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            taint_key: config.taint_key.clone(),
        }
    }

    /// Taint advertising `remaining_days` of node lifespan
    pub fn taint_for(&self, remaining_days: impl std::fmt::Display) -> Taint {
        Taint {
            key: self.taint_key.clone(),
            value: Some(remaining_days.to_string()),
            effect: EFFECT_NO_SCHEDULE.to_string(),
            ..Default::default()
        }
    }
}

impl Mutation<Node> for LifespanTaint {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mutate(&self, node: &Node) -> Result<Node> {
        let mut mutated = node.clone();
        let remaining = match node.labels().get(&self.taint_key) {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(mutated),
        };
        super::parse_days(NAME, &self.taint_key, remaining)?;
        let wanted = self.taint_for(remaining);

        let present = node
            .spec
            .as_ref()
            .and_then(|spec| spec.taints.as_ref())
            .is_some_and(|taints| taints.contains(&wanted));
        if present {
            return Ok(mutated);
        }

        let taints = mutated
            .spec
            .get_or_insert_with(Default::default)
            .taints
            .get_or_insert_with(Vec::new);
        append_missing(taints, vec![wanted]);
        info!(node = %node.name_any(), remaining_days = %remaining, "Set node lifespan taint");

        Ok(mutated)
    }
}
