// Sessiongate: Enclave error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("Platform keyring unavailable: {0}")]
    Keyring(String),

    #[error("Store key derivation failed: {0}")]
    Derivation(String),

    #[error("Device master key not found; run `sessiongate init` first")]
    MasterSecretNotFound,

    #[error("Device master key has {0} bytes, expected {1}")]
    BadSecretLength(usize, usize),
}
