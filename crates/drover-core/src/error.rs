//! Error types for Drover.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors, fatal at load time
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cycle detected in pipeline dependencies: {0}")]
    CycleDetected(String),

    #[error("Duplicate pipeline: {0}")]
    DuplicatePipeline(String),

    #[error("Pipeline {pipeline} depends on unknown pipeline {dependency}")]
    UnknownDependency { pipeline: String, dependency: String },

    // Dependency graph contract violations
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("Pipeline {0} already has a terminal status")]
    AlreadyTerminal(String),

    // Secret errors
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Secret store unreachable while resolving {name}: {message}")]
    SecretAccess { name: String, message: String },

    // Infrastructure errors
    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Status store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error stems from the pipeline configuration and should
    /// abort startup.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidPattern { .. }
                | Error::CycleDetected(_)
                | Error::DuplicatePipeline(_)
                | Error::UnknownDependency { .. }
        )
    }

    /// Whether this error came from resolving a secret.
    pub fn is_secret(&self) -> bool {
        matches!(self, Error::SecretNotFound(_) | Error::SecretAccess { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
