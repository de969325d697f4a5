// Sessiongate: Device Key Provider
//
// Manages the device-bound master secret that protects the credential store.
// The secret is generated once, kept in the platform keyring, and never
// written to disk or logs by this process.
//
// Flow:
//   1. `get_or_create_master_secret()` on `init`, `load_master_secret()` on every later open
//   2. `derive_store_key()` stretches the secret with Argon2id into a 32-byte SQLCipher key
//   3. The hex form of the key is handed to `PRAGMA key` and dropped (zeroized) right after

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Keyring service under which the master secret is filed.
const KEYRING_SERVICE: &str = "sessiongate";

/// Keyring account name of the master secret entry.
const KEYRING_USER: &str = "device-master-key";

/// Master secret length in bytes.
const MASTER_SECRET_LEN: usize = 32;

/// Store key length in bytes (AES-256 for SQLCipher).
const STORE_KEY_LEN: usize = 32;

// m=64 MiB, t=3, p=4
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of the device-bound key material. Implemented by the OS keyring
/// in production and by an in-memory provider in tests.
pub trait DeviceKeyProvider: Send + Sync {
    /// Return the master secret, generating and storing it on first use.
    fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    /// Return the existing master secret. Never creates one: a missing secret
    /// means the store written under it can no longer be decrypted.
    fn load_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    /// Derive the store encryption key from the master secret.
    fn derive_store_key(&self, master_secret: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;

    fn has_master_secret(&self) -> Result<bool, EnclaveError>;

    /// Remove the master secret. Anything encrypted under it becomes unreadable.
    fn delete_master_secret(&self) -> Result<(), EnclaveError>;
}

/// Salt = SHA-256(service || "::" || user), stable per installation name.
fn build_salt(service: &str, user: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(service.as_bytes());
    hasher.update(b"::");
    hasher.update(user.as_bytes());
    hasher.finalize().to_vec()
}

fn argon2id_derive(
    secret: &[u8],
    salt: &[u8],
    params: Params,
) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; STORE_KEY_LEN]);
    argon2
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| EnclaveError::Derivation(format!("Argon2id hash failed: {}", e)))?;
    Ok(key)
}

fn check_length(secret: Zeroizing<Vec<u8>>) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
    if secret.len() != MASTER_SECRET_LEN {
        return Err(EnclaveError::BadSecretLength(secret.len(), MASTER_SECRET_LEN));
    }
    Ok(secret)
}

fn generate_master_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);
    secret
}

// ─── Platform Implementation ─────────────────────────────────────────────────

/// Keyring-backed provider. Dispatches to:
///   - Linux: D-Bus Secret Service (GNOME Keyring / KDE Wallet), which
///     persists across reboots
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringProvider {
    service: String,
    user: String,
}

impl KeyringProvider {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| EnclaveError::Keyring(format!("failed to open keyring entry: {}", e)))
    }
}

impl Default for KeyringProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceKeyProvider for KeyringProvider {
    fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match self.load_master_secret() {
            Err(EnclaveError::MasterSecretNotFound) => {
                tracing::info!("No device master key found, generating one");
                let secret = generate_master_secret();
                self.entry()?.set_secret(&secret).map_err(|e| {
                    EnclaveError::Keyring(format!("failed to store master secret: {}", e))
                })?;
                tracing::info!("Device master key stored in platform keyring");
                Ok(secret)
            }
            other => other,
        }
    }

    fn load_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        match self.entry()?.get_secret() {
            Ok(secret) => {
                tracing::debug!("Loaded device master key from keyring");
                check_length(Zeroizing::new(secret))
            }
            Err(keyring::Error::NoEntry) => Err(EnclaveError::MasterSecretNotFound),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to read master secret: {}",
                e
            ))),
        }
    }

    fn derive_store_key(&self, master_secret: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(STORE_KEY_LEN))
            .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;
        argon2id_derive(master_secret, &build_salt(&self.service, &self.user), params)
    }

    fn has_master_secret(&self) -> Result<bool, EnclaveError> {
        match self.load_master_secret() {
            Ok(_) => Ok(true),
            Err(EnclaveError::MasterSecretNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn delete_master_secret(&self) -> Result<(), EnclaveError> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::warn!("Device master key deleted; the stored session is unrecoverable");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to delete master secret: {}",
                e
            ))),
        }
    }
}

// ─── In-Memory Provider for Tests ────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Keeps the master secret in memory and derives with light Argon2 costs.
    /// `unavailable()` simulates a keyring that is not ready.
    pub struct MockKeyProvider {
        secret: Mutex<Option<Vec<u8>>>,
        unavailable: bool,
    }

    impl MockKeyProvider {
        pub fn new() -> Self {
            Self {
                secret: Mutex::new(None),
                unavailable: false,
            }
        }

        pub fn with_secret(secret: Vec<u8>) -> Self {
            Self {
                secret: Mutex::new(Some(secret)),
                unavailable: false,
            }
        }

        pub fn unavailable() -> Self {
            Self {
                secret: Mutex::new(None),
                unavailable: true,
            }
        }

        fn guard_ready(&self) -> Result<(), EnclaveError> {
            if self.unavailable {
                return Err(EnclaveError::Keyring("keyring locked".to_string()));
            }
            Ok(())
        }
    }

    impl DeviceKeyProvider for MockKeyProvider {
        fn get_or_create_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
            self.guard_ready()?;
            let mut guard = self.secret.lock().unwrap();
            let secret = guard.get_or_insert_with(|| generate_master_secret().to_vec());
            Ok(Zeroizing::new(secret.clone()))
        }

        fn load_master_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
            self.guard_ready()?;
            let guard = self.secret.lock().unwrap();
            match guard.as_ref() {
                Some(s) => check_length(Zeroizing::new(s.clone())),
                None => Err(EnclaveError::MasterSecretNotFound),
            }
        }

        fn derive_store_key(
            &self,
            master_secret: &[u8],
        ) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
            let params = Params::new(1024, 1, 1, Some(STORE_KEY_LEN))
                .map_err(|e| EnclaveError::Derivation(format!("invalid Argon2 params: {}", e)))?;
            argon2id_derive(master_secret, &build_salt("sessiongate-test", "test"), params)
        }

        fn has_master_secret(&self) -> Result<bool, EnclaveError> {
            self.guard_ready()?;
            Ok(self.secret.lock().unwrap().is_some())
        }

        fn delete_master_secret(&self) -> Result<(), EnclaveError> {
            *self.secret.lock().unwrap() = None;
            Ok(())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
