//! lifespan-webhook - Kubernetes admission webhook for node lifespan scheduling.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Starts the health server and the TLS webhook server

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use lifespan_webhook::health::{HealthState, run_health_server};
use lifespan_webhook::{AdmissionConfig, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lifespan_webhook=info".parse()?),
        )
        .json()
        .init();

    info!("Starting lifespan-webhook");

    let config = AdmissionConfig::from_env()?;

    if !Path::new(&config.cert_path).exists() || !Path::new(&config.key_path).exists() {
        error!(
            cert_path = %config.cert_path,
            key_path = %config.key_path,
            "Webhook certificates not found"
        );
        return Err("webhook TLS certificates not found".into());
    }

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness works while TLS loads
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let health_state = health_state.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(&config, health_state).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down...");
            health_state.set_ready(false).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal: without them the process cannot
/// shut down gracefully.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
