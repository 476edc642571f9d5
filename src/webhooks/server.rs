//! Admission webhook server.
//!
//! Provides HTTP endpoints for Kubernetes admission webhooks.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a MutatingWebhookConfiguration pointing at `/mutate-pods` and
//!    `/mutate-nodes`, and a ValidatingWebhookConfiguration pointing at
//!    `/validate-pods` and `/validate-nodes`
//! 3. Mount the TLS certificate secret to the webhook pod at /etc/webhook/certs/

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::AdmissionConfig;
use crate::health::HealthState;
use crate::webhooks::admission::{Admitter, Decision, node_admitter, pod_admitter};

/// Shared state for webhook handlers
pub struct WebhookState {
    pub pods: Admitter<Pod>,
    pub nodes: Admitter<Node>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(config: &AdmissionConfig, health: Arc<HealthState>) -> Self {
        Self {
            pods: pod_admitter(config),
            nodes: node_admitter(config),
            health,
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate-pods", post(mutate_pods))
        .route("/validate-pods", post(validate_pods))
        .route("/mutate-nodes", post(mutate_nodes))
        .route("/validate-nodes", post(validate_nodes))
        .with_state(state)
}

async fn mutate_pods(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, &state.pods, Decision::Mutate, review)
}

async fn validate_pods(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, &state.pods, Decision::Validate, review)
}

async fn mutate_nodes(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, &state.nodes, Decision::Mutate, review)
}

async fn validate_nodes(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, &state.nodes, Decision::Validate, review)
}

/// Run one admission review through an admitter and record the outcome
fn handle<K>(
    state: &WebhookState,
    admitter: &Admitter<K>,
    decision: Decision,
    review: AdmissionReview<DynamicObject>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>)
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    let started = Instant::now();
    let kind = admitter.kind();

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            state
                .health
                .metrics
                .record_admission(decision.as_str(), &kind, "error", started.elapsed());
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        decision = %decision,
        kind = %request.kind.kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    // DELETE operations are always allowed
    if request.operation == Operation::Delete {
        info!(uid = %request.uid, "Admission request allowed (DELETE)");
        state
            .health
            .metrics
            .record_admission(decision.as_str(), &kind, "allowed", started.elapsed());
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(&request).into_review()),
        );
    }

    let verdict = admitter.review(decision, &request);
    state.health.metrics.record_admission(
        decision.as_str(),
        &kind,
        verdict.outcome(),
        started.elapsed(),
    );
    (StatusCode::OK, Json(verdict.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<webhook_port>` and serves the admission endpoints.
/// The health state is marked ready once the certificates are loaded.
pub async fn run_webhook_server(
    config: &AdmissionConfig,
    health: Arc<HealthState>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let state = Arc::new(WebhookState::new(config, health.clone()));
    let app = create_webhook_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
