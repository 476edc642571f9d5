//! Admission decisions.
//!
//! An [`Admitter`] decodes the object carried by an admission request into a
//! typed resource, runs either its mutation or its validation pipeline, and
//! turns the outcome into an [`AdmissionResponse`]:
//!
//! | outcome                         | allowed | code | payload            |
//! |---------------------------------|---------|------|--------------------|
//! | mutation succeeded              | true    | -    | JSON patch         |
//! | validation passed               | true    | 202  | confirmation       |
//! | validation denied               | false   | 403  | policy reason      |
//! | decode or rule failure          | false   | 400  | error message      |
//! | patch generation fault          | false   | 500  | error message      |
//!
//! Processing failures are also returned in [`Verdict::error`] so the caller
//! can log or count them separately from policy denials.

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::config::AdmissionConfig;
use crate::webhooks::display_name;
use crate::webhooks::error::{Error, Result};
use crate::webhooks::mutations::{MutationPipeline, node_mutations, pod_mutations};
use crate::webhooks::policies::{ValidationPipeline, default_validations};

/// Status code for a passed validation
pub const STATUS_ACCEPTED: u16 = 202;
/// Status code for a policy denial
pub const STATUS_FORBIDDEN: u16 = 403;

/// The decision a caller asked for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Mutate,
    Validate,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Mutate => "mutate",
            Decision::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission decision
#[derive(Debug)]
pub struct Verdict {
    /// Response to send back to the API server
    pub response: AdmissionResponse,
    /// Processing failure behind a rejection, if any
    pub error: Option<Error>,
}

impl Verdict {
    fn accepted(response: AdmissionResponse) -> Self {
        Self {
            response,
            error: None,
        }
    }

    fn failed(request: &AdmissionRequest<DynamicObject>, context: &str, error: Error) -> Self {
        let message = format!("{}: {}", context, error);
        Self {
            response: reject(request, error.status_code(), message),
            error: Some(error),
        }
    }

    /// Short label for metrics: `allowed`, `denied` or `error`
    pub fn outcome(&self) -> &'static str {
        if self.error.is_some() {
            "error"
        } else if self.response.allowed {
            "allowed"
        } else {
            "denied"
        }
    }

    pub fn into_review(self) -> AdmissionReview<DynamicObject> {
        self.response.into_review()
    }
}

/// Build a rejection carrying a status code and message
pub fn reject(
    request: &AdmissionRequest<DynamicObject>,
    code: u16,
    message: String,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(message);
    response.result.code = code;
    response
}

/// Decision engine for one resource kind
pub struct Admitter<K> {
    mutations: MutationPipeline<K>,
    validations: ValidationPipeline<K>,
}

impl<K> Admitter<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    pub fn new(mutations: MutationPipeline<K>, validations: ValidationPipeline<K>) -> Self {
        Self {
            mutations,
            validations,
        }
    }

    /// Kind this admitter accepts
    pub fn kind(&self) -> String {
        K::kind(&()).into_owned()
    }

    /// Extract the typed resource from the request.
    ///
    /// Fails when the request is for another kind, carries no object or the
    /// object does not parse as `K`.
    pub fn decode(&self, request: &AdmissionRequest<DynamicObject>) -> Result<K> {
        let kind = K::kind(&());
        if request.kind.kind != kind || request.kind.group != K::group(&()) {
            return Err(Error::decode(
                &kind,
                format!(
                    "only {} resources are supported here, got {:?}",
                    kind, request.kind.kind
                ),
            ));
        }

        let object = request
            .object
            .as_ref()
            .ok_or_else(|| Error::decode(&kind, "request carries no object"))?;
        serde_json::to_value(object)
            .and_then(serde_json::from_value)
            .map_err(|e| Error::decode(&kind, e.to_string()))
    }

    /// Run the requested decision
    pub fn review(&self, decision: Decision, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        match decision {
            Decision::Mutate => self.mutate(request),
            Decision::Validate => self.validate(request),
        }
    }

    /// Mutate the request object and answer with the resulting JSON patch
    pub fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        let kind = self.kind().to_lowercase();
        let resource = match self.decode(request) {
            Ok(resource) => resource,
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Failed to decode admission object");
                let context = format!("could not parse {} in admission review request", kind);
                return Verdict::failed(request, &context, e);
            }
        };

        let patch = match self.mutations.patch(&resource) {
            Ok(patch) => patch,
            Err(e) => {
                error!(
                    uid = %request.uid,
                    name = %display_name(&resource),
                    error = %e,
                    "Mutation failed"
                );
                return Verdict::failed(request, &format!("could not mutate {}", kind), e);
            }
        };

        let operations = patch.0.len();
        match AdmissionResponse::from(request).with_patch(patch) {
            Ok(response) => {
                info!(
                    uid = %request.uid,
                    name = %display_name(&resource),
                    operations,
                    "Admission request mutated"
                );
                Verdict::accepted(response)
            }
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Failed to encode patch");
                let fault = Error::Generator(e.to_string());
                Verdict::failed(request, &format!("could not mutate {}", kind), fault)
            }
        }
    }

    /// Validate the request object
    pub fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        let kind = self.kind().to_lowercase();
        let resource = match self.decode(request) {
            Ok(resource) => resource,
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Failed to decode admission object");
                let context = format!("could not parse {} in admission review request", kind);
                return Verdict::failed(request, &context, e);
            }
        };

        let result = match self.validations.validate_all(&resource) {
            Ok(result) => result,
            Err(e) => {
                error!(
                    uid = %request.uid,
                    name = %display_name(&resource),
                    error = %e,
                    "Validation failed"
                );
                return Verdict::failed(request, &format!("could not validate {}", kind), e);
            }
        };

        if !result.allowed {
            warn!(
                uid = %request.uid,
                name = %display_name(&resource),
                reason = %result.reason,
                "Admission request denied"
            );
            return Verdict::accepted(reject(request, STATUS_FORBIDDEN, result.reason));
        }

        debug!(uid = %request.uid, name = %display_name(&resource), "Admission request allowed");
        let mut response = AdmissionResponse::from(request);
        response.result.code = STATUS_ACCEPTED;
        response.result.message = format!("valid {}", kind);
        Verdict::accepted(response)
    }
}

/// Admitter for pods with the configured rules
pub fn pod_admitter(config: &AdmissionConfig) -> Admitter<Pod> {
    Admitter::new(pod_mutations(config), default_validations(config))
}

/// Admitter for nodes with the configured rules
pub fn node_admitter(config: &AdmissionConfig) -> Admitter<Node> {
    Admitter::new(node_mutations(config), default_validations(config))
}
