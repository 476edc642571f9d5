//! Minimum lifespan tolerations.
//!
//! Nodes carry a `NoSchedule` taint whose value is the number of days they
//! have left. A pod requesting a minimum lifespan of `m` days through its
//! lifespan label gets one `Equal` toleration for every value from the
//! configured maximum down to `m`, so it only lands on nodes that will live
//! at least that long. Pods without the label tolerate every node.

use k8s_openapi::api::core::v1::{Pod, Toleration};
use kube::ResourceExt;
use tracing::{debug, info};

use super::{EFFECT_NO_SCHEDULE, Mutation, OPERATOR_EQUAL, OPERATOR_EXISTS, append_missing};
use crate::config::AdmissionConfig;
use crate::webhooks::display_name;
use crate::webhooks::error::Result;

/// Rule name
pub const NAME: &str = "min_lifespan";

/// Adds lifespan tolerations derived from the pod's lifespan label
#[derive(Clone, Debug)]
pub struct LifespanTolerations {
    label: String,
    taint_key: String,
    max_days: u32,
}

impl LifespanTolerations {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            label: config.lifespan_label.clone(),
            taint_key: config.taint_key.clone(),
            max_days: config.max_lifespan_days,
        }
    }

    /// Tolerations required for a pod with the given label value.
    ///
    /// An absent or empty value yields the single catch-all `Exists`
    /// toleration. A value `m` yields `Equal` tolerations for `max..=m` in
    /// descending order, which is empty once `m` exceeds the maximum.
    pub fn tolerations_for(&self, requested: Option<&str>) -> Result<Vec<Toleration>> {
        let requested = match requested {
            Some(value) if !value.is_empty() => value,
            _ => {
                return Ok(vec![Toleration {
                    key: Some(self.taint_key.clone()),
                    operator: Some(OPERATOR_EXISTS.to_string()),
                    effect: Some(EFFECT_NO_SCHEDULE.to_string()),
                    ..Default::default()
                }]);
            }
        };

        let min_days = super::parse_days(NAME, &self.label, requested)?;
        Ok((min_days..=u64::from(self.max_days))
            .rev()
            .map(|days| Toleration {
                key: Some(self.taint_key.clone()),
                operator: Some(OPERATOR_EQUAL.to_string()),
                effect: Some(EFFECT_NO_SCHEDULE.to_string()),
                value: Some(days.to_string()),
                ..Default::default()
            })
            .collect())
    }
}

impl Mutation<Pod> for LifespanTolerations {
    fn name(&self) -> &'static str {
        NAME
    }

    fn mutate(&self, pod: &Pod) -> Result<Pod> {
        let requested = pod.labels().get(&self.label).map(String::as_str);
        let wanted = self.tolerations_for(requested)?;

        match requested {
            Some(value) if !value.is_empty() => info!(
                pod_name = %display_name(pod),
                min_lifespan = value,
                "Setting lifespan tolerations"
            ),
            _ => info!(
                pod_name = %display_name(pod),
                min_lifespan = 0,
                "No lifespan label found, applying default lifespan toleration"
            ),
        }

        let mut mutated = pod.clone();
        let existing = mutated
            .spec
            .as_ref()
            .and_then(|spec| spec.tolerations.as_ref());
        if wanted
            .iter()
            .all(|t| existing.is_some_and(|list| list.contains(t)))
        {
            return Ok(mutated);
        }

        let tolerations = mutated
            .spec
            .get_or_insert_with(Default::default)
            .tolerations
            .get_or_insert_with(Vec::new);
        let appended = append_missing(tolerations, wanted);
        debug!(pod_name = %display_name(pod), appended, "Appended lifespan tolerations");

        Ok(mutated)
    }
}
