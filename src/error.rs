//! Error types for the onboarding engine.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Local storage errors (the answer mirror).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures reported by (or while talking to) the case-management backend.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("An account already exists for {email}")]
    AccountExists { email: String },

    #[error("Authentication rejected by {service}")]
    Unauthorized { service: String },

    #[error("{service} request failed: {reason}")]
    Request { service: String, reason: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

/// Errors raised by the flow controller and its tables.
///
/// Gate denials are not errors; they surface through the validation flag.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Unknown answer field: {key}")]
    UnknownField { key: String },

    #[error("Field {key} is written by the engine, not by answers")]
    ReadOnlyField { key: String },

    #[error("Unknown step: {id}")]
    UnknownStep { id: String },

    #[error("Invalid step graph: {0}")]
    InvalidGraph(String),

    #[error("Another action is already in progress")]
    Busy,

    #[error(
        "An account already exists for {email}. Switch to \"sign in\" to continue your existing application."
    )]
    AccountExists { email: String },

    #[error("Step {step} cannot continue: {field} is missing")]
    MissingPrerequisite { step: String, field: String },

    #[error("Please upload the {label} before continuing")]
    MissingDocument { field: String, label: String },

    #[error("The application has already been submitted")]
    AlreadySubmitted,

    #[error("No application has been created yet")]
    NoApplication,

    #[error("No saved draft for application {application_id}")]
    DraftNotFound { application_id: String },

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl FlowError {
    /// Whether this error came from a remote collaborator.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::AccountExists { .. })
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
