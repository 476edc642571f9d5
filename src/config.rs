//! Runtime configuration for the admission webhook.
//!
//! Defaults match the reference deployment. Each field can be overridden
//! from the environment; see [`AdmissionConfig::from_env`].

use std::str::FromStr;

use thiserror::Error;
use tracing::info;

/// Default label carrying the minimum lifespan (in days) a pod requests
pub const DEFAULT_LIFESPAN_LABEL: &str = "acme.com/lifespan-requested";
/// Default taint key marking the remaining lifespan (in days) of a node
pub const DEFAULT_TAINT_KEY: &str = "acme.com/lifespan-remaining";
/// Default upper bound of the lifespan toleration range
pub const DEFAULT_MAX_LIFESPAN_DAYS: u32 = 14;
/// Default substring rejected in resource names
pub const DEFAULT_DISALLOWED_NAME: &str = "offensive";
/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration shared by the rule constructors and the servers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionConfig {
    pub lifespan_label: String,
    pub taint_key: String,
    pub max_lifespan_days: u32,
    /// Name and value of the env var injected into every container
    pub injected_env: (String, String),
    pub disallowed_name: String,
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: String,
    pub key_path: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lifespan_label: DEFAULT_LIFESPAN_LABEL.to_string(),
            taint_key: DEFAULT_TAINT_KEY.to_string(),
            max_lifespan_days: DEFAULT_MAX_LIFESPAN_DAYS,
            injected_env: ("KUBE".to_string(), "true".to_string()),
            disallowed_name: DEFAULT_DISALLOWED_NAME.to_string(),
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
        }
    }
}

impl AdmissionConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables keep their default. Numeric variables that do not parse
    /// are rejected instead of silently falling back.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(label) = lookup("LIFESPAN_LABEL") {
            config.lifespan_label = label;
        }
        if let Some(key) = lookup("LIFESPAN_TAINT_KEY") {
            config.taint_key = key;
        }
        if let Some(name) = lookup("DISALLOWED_NAME_SUBSTRING") {
            config.disallowed_name = name;
        }
        if let Some(path) = lookup("WEBHOOK_CERT_PATH") {
            config.cert_path = path;
        }
        if let Some(path) = lookup("WEBHOOK_KEY_PATH") {
            config.key_path = path;
        }
        config.max_lifespan_days =
            parse_var(&lookup, "LIFESPAN_MAX_DAYS", config.max_lifespan_days)?;
        config.webhook_port = parse_var(&lookup, "WEBHOOK_PORT", config.webhook_port)?;
        config.health_port = parse_var(&lookup, "HEALTH_PORT", config.health_port)?;

        info!(
            lifespan_label = %config.lifespan_label,
            taint_key = %config.taint_key,
            max_lifespan_days = config.max_lifespan_days,
            "Loaded admission configuration"
        );
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}
