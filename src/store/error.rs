// Sessiongate: Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The device key provider is not ready, or the store cannot be decrypted
    /// with the device key. Fatal for the call; never treated as "empty".
    #[error("Device key unavailable: {0}")]
    KeyUnavailable(String),

    /// Durable storage could not be read or written. Retryable by the caller.
    #[error("Store I/O failure: {0}")]
    IoFailure(String),

    /// A persisted value exists but cannot be interpreted.
    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::IoFailure(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::IoFailure(e.to_string())
    }
}

impl From<crate::enclave::EnclaveError> for StoreError {
    fn from(e: crate::enclave::EnclaveError) -> Self {
        StoreError::KeyUnavailable(e.to_string())
    }
}
