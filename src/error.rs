//! Error types for Flotilla

use thiserror::Error;

/// Result type for Flotilla operations
pub type Result<T> = std::result::Result<T, FlotillaError>;

/// Flotilla error types
#[derive(Error, Debug)]
pub enum FlotillaError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unresolved service ordering:\n{0}")]
    Graph(String),

    #[error("{operation} of {service} on {host} failed: {reason}")]
    Execution {
        operation: String,
        service: String,
        host: String,
        reason: String,
    },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
