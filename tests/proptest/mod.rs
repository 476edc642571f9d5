// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for lifespan-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;
use lifespan_webhook::AdmissionConfig;
use lifespan_webhook::webhooks::Error;
use lifespan_webhook::webhooks::mutations::{LifespanTolerations, pod_mutations};
use lifespan_webhook::webhooks::patch::diff;
use proptest::prelude::*;
use serde_json::{Map, Value};

use common::fixtures::{PodBuilder, env};

/// Strategy for generating random JSON documents.
///
/// Keys draw from a small alphabet including the pointer escape characters
/// so that objects overlap and escaping gets exercised.
fn any_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-100i64..100).prop_map(Value::from),
        "[a-c]{0,3}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[ab/~]{1,2}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for generating label values that are not decimal day counts.
fn non_numeric_label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.-]{0,8}|-[0-9]{1,3}|[0-9]{1,2}[a-z]"
}

/// Strategy for generating pods with a mix of labelled and env-carrying containers.
fn any_pod() -> impl Strategy<Value = Pod> {
    (
        prop::option::of(0u32..30),
        prop::collection::vec(any::<bool>(), 1..4),
        0usize..3,
    )
        .prop_map(|(days, containers, init)| {
            let mut builder = PodBuilder::new("generated");
            if let Some(days) = days {
                builder = builder.lifespan(days.to_string());
            }
            for (i, has_env) in containers.into_iter().enumerate() {
                let name = format!("app-{}", i);
                builder = if has_env {
                    builder.container_with_env(name, vec![env("KUBE", "false")])
                } else {
                    builder.container(name)
                };
            }
            for i in 0..init {
                builder = builder.init_container(format!("init-{}", i));
            }
            builder.build()
        })
}

fn apply(original: &Value, patch: &Patch) -> Value {
    let mut doc = original.clone();
    json_patch::patch(&mut doc, &patch.0).unwrap();
    doc
}

proptest! {
    /// Property: A label of m days (m <= max) yields max - m + 1 descending tolerations.
    #[test]
    fn test_toleration_count(days in 0u32..=14) {
        let rule = LifespanTolerations::new(&AdmissionConfig::default());
        let tolerations = rule.tolerations_for(Some(&days.to_string())).unwrap();

        prop_assert_eq!(tolerations.len() as u32, 15 - days);
        let values: Vec<u32> = tolerations
            .iter()
            .map(|t| t.value.as_deref().unwrap().parse().unwrap())
            .collect();
        prop_assert!(values.windows(2).all(|w| w[0] == w[1] + 1));
        prop_assert_eq!(values.first().copied(), Some(14));
        prop_assert_eq!(values.last().copied(), Some(days));
    }

    /// Property: Labels above the maximum require no tolerations.
    #[test]
    fn test_above_maximum_is_empty(days in 15u32..10_000) {
        let rule = LifespanTolerations::new(&AdmissionConfig::default());
        prop_assert!(rule.tolerations_for(Some(&days.to_string())).unwrap().is_empty());
    }

    /// Property: Integers too large for any machine type still require no tolerations.
    #[test]
    fn test_huge_label_is_empty(value in "[1-9][0-9]{10,29}") {
        let rule = LifespanTolerations::new(&AdmissionConfig::default());
        let tolerations = rule.tolerations_for(Some(&value));
        prop_assert!(tolerations.is_ok(), "rejected {:?}", value);
        prop_assert!(tolerations.unwrap().is_empty());
    }

    /// Property: Non-numeric labels are rule errors, never panics.
    #[test]
    fn test_non_numeric_label_rejected(value in non_numeric_label()) {
        let rule = LifespanTolerations::new(&AdmissionConfig::default());
        let result = rule.tolerations_for(Some(&value));
        prop_assert!(matches!(result, Err(Error::Rule { .. })), "accepted {:?}", value);
    }

    /// Property: Applying the pod rules to their own output changes nothing.
    #[test]
    fn test_pod_mutations_idempotent(pod in any_pod()) {
        let pipeline = pod_mutations(&AdmissionConfig::default());
        let once = pipeline.apply(&pod).unwrap();
        let twice = pipeline.apply(&once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(pipeline.patch(&once).unwrap().0.is_empty());
    }

    /// Property: Every container ends up with exactly one KUBE entry.
    #[test]
    fn test_env_never_duplicated(pod in any_pod()) {
        let mutated = pod_mutations(&AdmissionConfig::default()).apply(&pod).unwrap();
        let spec = mutated.spec.unwrap();
        let all = spec.containers.iter().chain(spec.init_containers.iter().flatten());
        for container in all {
            let count = container
                .env
                .iter()
                .flatten()
                .filter(|e| e.name == "KUBE")
                .count();
            prop_assert_eq!(count, 1, "container {}", container.name);
        }
    }

    /// Property: The emitted patch applied to the original yields the mutated pod.
    #[test]
    fn test_pod_patch_round_trip(pod in any_pod()) {
        let pipeline = pod_mutations(&AdmissionConfig::default());
        let patch = pipeline.patch(&pod).unwrap();
        let expected = serde_json::to_value(pipeline.apply(&pod).unwrap()).unwrap();
        prop_assert_eq!(apply(&serde_json::to_value(&pod).unwrap(), &patch), expected);
    }

    /// Property: diff(a, b) applied to a yields b.
    #[test]
    fn test_diff_round_trip(a in any_json(), b in any_json()) {
        let original = serde_json::json!({ "doc": a });
        let mutated = serde_json::json!({ "doc": b });
        let patch = diff(&original, &mutated).unwrap();
        prop_assert_eq!(apply(&original, &patch), mutated);
    }

    /// Property: Identical documents produce an empty patch.
    #[test]
    fn test_diff_identity(a in any_json()) {
        prop_assert!(diff(&a, &a).unwrap().0.is_empty());
    }

    /// Property: Diff output is deterministic.
    #[test]
    fn test_diff_deterministic(a in any_json(), b in any_json()) {
        let first = serde_json::to_string(&diff(&a, &b).unwrap()).unwrap();
        let second = serde_json::to_string(&diff(&a, &b).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
