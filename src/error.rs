//! Error types for the gateway.

use uuid::Uuid;

use crate::builds::BuildStatus;

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Reasons a bearer credential is rejected.
///
/// Every variant surfaces to the caller as the same unauthorized response;
/// the distinction only exists for logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential expired")]
    Expired,

    #[error("credential has no subject")]
    MissingSubject,

    #[error("failed to sign credential: {0}")]
    Signing(String),
}

impl AuthError {
    /// Short, stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::Malformed(_) => "malformed",
            Self::Expired => "expired",
            Self::MissingSubject => "missing_subject",
            Self::Signing(_) => "signing",
        }
    }
}

/// Job registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("build {0} not found")]
    NotFound(Uuid),

    #[error("build {0} is finalized and no longer accepts log lines")]
    Finalized(Uuid),

    #[error("build {id} cannot transition from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: BuildStatus,
        to: BuildStatus,
    },
}

/// Unclassified failures from the container runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Docker error: {reason}")]
    Docker { reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Compose {action} failed: {stderr}")]
    Compose { action: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
