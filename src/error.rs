// Sessiongate: Top-level error types
//
// Aggregates the module errors into one enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all Sessiongate operations.
#[derive(Debug, Error)]
pub enum SessionGateError {
    #[error("Enclave error: {0}")]
    Enclave(#[from] crate::enclave::EnclaveError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Cookie error: {0}")]
    Codec(#[from] crate::cookie::CodecError),

    #[error("Gate error: {0}")]
    Gate(#[from] crate::gate::GateError),

    #[error(transparent)]
    Session(#[from] crate::session::SessionError),

    #[error("Registration error: {0}")]
    Registration(#[from] crate::registration::RegistrationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SessionGateError>;
