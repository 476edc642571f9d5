//! Error types for admission processing.
//!
//! Policy rejections are not errors: they are carried as
//! [`ValidationResult`](super::policies::ValidationResult) values. Everything
//! here aborts the invocation that raised it.

use thiserror::Error;

/// Error type for admission operations
#[derive(Error, Debug)]
pub enum Error {
    /// Payload kind mismatch, missing object or unparsable document
    #[error("could not decode {kind} from admission request: {message}")]
    Decode { kind: String, message: String },

    /// A mutation or validation rule could not evaluate its input
    #[error("rule {rule} failed: {message}")]
    Rule { rule: &'static str, message: String },

    /// The patch generator could not describe the mutated resource
    #[error("patch generation failed: {0}")]
    Generator(String),

    /// A resource could not be rendered as JSON for diffing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a decode error for the expected kind
    pub fn decode(kind: &str, message: impl Into<String>) -> Self {
        Error::Decode {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Build a rule error attributed to the named rule
    pub fn rule(rule: &'static str, message: impl Into<String>) -> Self {
        Error::Rule {
            rule,
            message: message.into(),
        }
    }

    /// Check if the caller sent something we cannot process
    pub fn is_bad_input(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::Rule { .. })
    }

    /// HTTP status code reported in the admission response
    pub fn status_code(&self) -> u16 {
        if self.is_bad_input() { 400 } else { 500 }
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, Error>;
