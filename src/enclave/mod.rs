// Sessiongate: Enclave Module
//
// Owns the device-bound master key. The master secret lives in the OS keyring
// and is stretched with Argon2id into the key that encrypts the credential
// store at rest.

mod error;
mod provider;

pub use error::EnclaveError;
pub use provider::{DeviceKeyProvider, KeyringProvider};

#[cfg(test)]
pub use provider::mock;
