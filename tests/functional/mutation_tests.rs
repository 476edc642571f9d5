//! End-to-end mutation scenarios.

use k8s_openapi::api::core::v1::{Node, Pod};
use lifespan_webhook::AdmissionConfig;
use lifespan_webhook::webhooks::{Decision, Error, node_admitter, pod_admitter};
use serde_json::{Value, json};

use crate::common::fixtures::{
    NodeBuilder, PodBuilder, TAINT_KEY, catch_all_toleration, env, request,
};
use crate::patch_of;

fn lifespan_toleration(value: &str) -> Value {
    json!({
        "effect": "NoSchedule",
        "key": TAINT_KEY,
        "operator": "Equal",
        "value": value
    })
}

/// Apply the emitted patch to the submitted object
fn apply(object: &impl serde::Serialize, patch: Value) -> Value {
    let mut doc = serde_json::to_value(object).unwrap();
    let patch: json_patch::Patch = serde_json::from_value(patch).unwrap();
    json_patch::patch(&mut doc, &patch.0).unwrap();
    doc
}

#[test]
fn test_lifespan_pod_patch() {
    let pod = PodBuilder::new("lifespan")
        .lifespan("7")
        .container("lifespan")
        .build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let verdict = admitter.review(Decision::Mutate, &request("uid-1", "Pod", &pod));
    assert!(verdict.error.is_none());
    assert!(verdict.response.allowed);
    assert_eq!(verdict.response.uid, "uid-1");

    let tolerations: Vec<Value> = (7..=14)
        .rev()
        .map(|d| lifespan_toleration(&d.to_string()))
        .collect();
    assert_eq!(
        patch_of(&verdict.response),
        json!([
            {
                "op": "add",
                "path": "/spec/containers/0/env",
                "value": [{"name": "KUBE", "value": "true"}]
            },
            {
                "op": "add",
                "path": "/spec/tolerations",
                "value": tolerations
            }
        ])
    );
}

#[test]
fn test_unlabelled_pod_gets_catch_all() {
    let pod = PodBuilder::new("plain").container("app").build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let verdict = admitter.mutate(&request("uid-2", "Pod", &pod));
    let patch = patch_of(&verdict.response);
    assert_eq!(
        patch[1],
        json!({
            "op": "add",
            "path": "/spec/tolerations",
            "value": [serde_json::to_value(catch_all_toleration()).unwrap()]
        })
    );
}

#[test]
fn test_second_application_yields_empty_patch() {
    let pod = PodBuilder::new("twice")
        .lifespan("3")
        .container("app")
        .init_container("init")
        .build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let first = admitter.mutate(&request("uid-3", "Pod", &pod));
    let mutated: Pod = serde_json::from_value(apply(&pod, patch_of(&first.response))).unwrap();

    let second = admitter.mutate(&request("uid-4", "Pod", &mutated));
    assert!(second.response.allowed);
    assert_eq!(patch_of(&second.response), json!([]));
}

#[test]
fn test_existing_tolerations_extended_by_index() {
    let pod = PodBuilder::new("extend")
        .lifespan("13")
        .container("app")
        .tolerations(vec![catch_all_toleration()])
        .build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let patch = patch_of(&admitter.mutate(&request("uid-5", "Pod", &pod)).response);
    let ops = patch.as_array().unwrap();
    assert_eq!(ops[1]["path"], "/spec/tolerations/1");
    assert_eq!(ops[1]["value"], lifespan_toleration("14"));
    assert_eq!(ops[2]["path"], "/spec/tolerations/2");
    assert_eq!(ops[2]["value"], lifespan_toleration("13"));
}

#[test]
fn test_existing_env_entry_not_duplicated() {
    let pod = PodBuilder::new("env")
        .container_with_env("app", vec![env("KUBE", "false")])
        .container("sidecar")
        .build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let verdict = admitter.mutate(&request("uid-6", "Pod", &pod));
    let mutated: Pod = serde_json::from_value(apply(&pod, patch_of(&verdict.response))).unwrap();
    let containers = mutated.spec.unwrap().containers;
    assert_eq!(containers[0].env, Some(vec![env("KUBE", "false")]));
    assert_eq!(containers[1].env, Some(vec![env("KUBE", "true")]));
}

#[test]
fn test_invalid_lifespan_rejected_without_patch() {
    let pod = PodBuilder::new("bad").lifespan("7d").container("app").build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let verdict = admitter.mutate(&request("uid-7", "Pod", &pod));
    assert!(!verdict.response.allowed);
    assert!(verdict.response.patch.is_none());
    assert_eq!(verdict.response.result.code, 400);
    assert!(verdict.response.result.message.contains("7d"));
    assert!(matches!(verdict.error, Some(Error::Rule { .. })));
}

#[test]
fn test_pod_admitter_rejects_nodes() {
    let node = NodeBuilder::new("worker").build();
    let admitter = pod_admitter(&AdmissionConfig::default());

    let verdict = admitter.mutate(&request("uid-8", "Node", &node));
    assert!(!verdict.response.allowed);
    assert_eq!(verdict.response.result.code, 400);
    assert!(matches!(verdict.error, Some(Error::Decode { .. })));
}

#[test]
fn test_node_taint_patch() {
    let node = NodeBuilder::new("worker").remaining("6").build();
    let admitter = node_admitter(&AdmissionConfig::default());

    let verdict = admitter.mutate(&request("uid-9", "Node", &node));
    assert!(verdict.response.allowed);
    assert_eq!(
        patch_of(&verdict.response),
        json!([{
            "op": "add",
            "path": "/spec/taints",
            "value": [{"effect": "NoSchedule", "key": TAINT_KEY, "value": "6"}]
        }])
    );

    let mutated: Node = serde_json::from_value(apply(&node, patch_of(&verdict.response))).unwrap();
    let again = admitter.mutate(&request("uid-10", "Node", &mutated));
    assert_eq!(patch_of(&again.response), json!([]));
}

#[test]
fn test_custom_configuration() {
    let config = AdmissionConfig {
        lifespan_label: "example.org/days".to_string(),
        max_lifespan_days: 3,
        ..Default::default()
    };
    let pod = PodBuilder::new("custom")
        .label("example.org/days", "2")
        .container("app")
        .build();

    let verdict = pod_admitter(&config).mutate(&request("uid-11", "Pod", &pod));
    let patch = patch_of(&verdict.response);
    assert_eq!(patch[1]["value"].as_array().unwrap().len(), 2);
}
