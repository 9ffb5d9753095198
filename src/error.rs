//! Error types for the KYC verification engine

use thiserror::Error;

/// Result type alias for verification operations
pub type Result<T> = std::result::Result<T, KycError>;

#[derive(Error, Debug)]
pub enum KycError {

    // =============================
    // Capture Errors
    // =============================

    #[error("Image decode error: {0}")]
    DecodeError(String),

    #[error("No face found in {0}")]
    NoFaceFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid transition: cannot {operation} while session is {stage}")]
    InvalidTransition {
        operation: &'static str,
        stage: String,
    },

    // =============================
    // Collaborator Errors
    // =============================

    #[error("{service} error: {message}")]
    CollaboratorError {
        service: &'static str,
        message: String,
    },

    // =============================
    // Service Layer Errors
    // =============================

    #[error("Customer not found: {0}")]
    CustomerNotFound(uuid::Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Image encode error: {0}")]
    ImageEncodeError(String),

    #[error("Background task error: {0}")]
    TaskError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KycError {
    pub fn collaborator(service: &'static str, message: impl Into<String>) -> Self {
        KycError::CollaboratorError {
            service,
            message: message.into(),
        }
    }

    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            KycError::DecodeError(_) => "decode_error",
            KycError::NoFaceFound(_) => "no_face_found",
            KycError::SessionNotFound(_) => "session_not_found",
            KycError::InvalidTransition { .. } => "invalid_transition",
            KycError::CollaboratorError { .. } => "collaborator_error",
            KycError::CustomerNotFound(_) => "customer_not_found",
            KycError::InvalidInput(_) => "invalid_input",
            KycError::ConfigError(_) => "config_error",
            KycError::ImageEncodeError(_) => "image_encode_error",
            KycError::TaskError(_) => "task_error",
            KycError::SerializationError(_) => "serialization_error",
            KycError::IoError(_) => "io_error",
        }
    }
}
