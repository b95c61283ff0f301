//! Error types for the estimate service

use thiserror::Error;

/// Result type alias for estimate operations
pub type Result<T> = std::result::Result<T, EstimationError>;

#[derive(Error, Debug)]
pub enum EstimationError {

    // =============================
    // Request / Payload Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed model output. Absorbed by the providers, never surfaced.
    #[error("Parse error: {0}")]
    Parse(String),

    // =============================
    // Provider Errors
    // =============================

    /// Network, auth or quota failure from an estimate backend.
    #[error("{message}")]
    Provider {
        message: String,
        processing_time: f64,
    },

    /// Both the production backend and the fallback failed.
    #[error("{message}")]
    Terminal {
        message: String,
        processing_time: f64,
    },

    // =============================
    // Service Errors
    // =============================

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EstimationError {
    /// Seconds spent before the failure, for provider-level errors.
    pub fn processing_time(&self) -> Option<f64> {
        match self {
            EstimationError::Provider { processing_time, .. }
            | EstimationError::Terminal { processing_time, .. } => Some(*processing_time),
            _ => None,
        }
    }
}
