// Sessiongate: Credential Store Repository
//
// Key/value access to the encrypted preferences table. Every call opens its
// own keyed connection, so a reader always sees what is on disk right now
// (including a wipe done by another process) rather than a cached copy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use zeroize::Zeroizing;

use super::db::Database;
use super::StoreError;
use crate::enclave::DeviceKeyProvider;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Durable, encrypted key/value storage.
pub trait CredentialStore: Send + Sync {
    /// Read a value from durable storage.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a single value. Durable once this returns `Ok`.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.set_batch(&[(key, value)])
    }

    /// Write several values atomically: readers see all of them or none.
    fn set_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError>;

    /// Remove every stored value in one atomic step.
    fn clear(&self) -> Result<(), StoreError>;

    /// When `key` was last written, if the backend tracks it.
    fn modified_at(&self, _key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(None)
    }
}

// ─── SQLCipher Implementation ────────────────────────────────────────────────

const SIDE_FILE_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// How `SqliteCredentialStore::wipe` disarmed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiped {
    NothingStored,
    Cleared,
    /// The record was unreadable with the device key and was deleted.
    Discarded,
}

fn remove_if_present(path: &Path) -> Result<bool, StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub struct SqliteCredentialStore {
    path: PathBuf,
    hex_key: Zeroizing<String>,
}

/// Hex form of the store key, as SQLCipher's raw-key PRAGMA expects it.
fn key_to_hex(key: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(key.iter().map(|b| format!("{:02x}", b)).collect())
}

impl SqliteCredentialStore {
    /// Create the store on first run: generates the device master key if
    /// needed and initializes the database file.
    pub fn create(path: &Path, provider: &dyn DeviceKeyProvider) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let secret = provider.get_or_create_master_secret()?;
        let key = provider.derive_store_key(&secret)?;
        Self::with_key(path, key_to_hex(&key))
    }

    /// Open an existing store. A missing or unreadable device key is
    /// `StoreError::KeyUnavailable`; the master key is never created here.
    pub fn open(path: &Path, provider: &dyn DeviceKeyProvider) -> Result<Self, StoreError> {
        let secret = provider.load_master_secret()?;
        let key = provider.derive_store_key(&secret)?;
        Self::with_key(path, key_to_hex(&key))
    }

    fn with_key(path: &Path, hex_key: Zeroizing<String>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.to_path_buf(),
            hex_key,
        };
        // Fail early on a wrong key rather than on the first read
        store.connect()?;
        tracing::debug!(path = %path.display(), "Credential store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First-run setup that survives a lost device key. A record file left
    /// behind with no master key in the keyring can never be decrypted
    /// again, so it is discarded before a fresh store is created.
    /// Returns the store and whether an orphaned file was dropped.
    pub fn create_or_reset(
        path: &Path,
        provider: &dyn DeviceKeyProvider,
    ) -> Result<(Self, bool), StoreError> {
        let orphaned = path.exists() && !provider.has_master_secret()?;
        if orphaned {
            tracing::warn!(path = %path.display(), "Record has no device key left, discarding it");
            Self::discard(path)?;
        }
        Ok((Self::create(path, provider)?, orphaned))
    }

    /// Disarm the gate. A record the device key can open is cleared in place;
    /// one it cannot open is removed from disk.
    pub fn wipe(path: &Path, provider: &dyn DeviceKeyProvider) -> Result<Wiped, StoreError> {
        if !path.exists() {
            return Ok(Wiped::NothingStored);
        }
        match Self::open(path, provider) {
            Ok(store) => {
                store.clear()?;
                Ok(Wiped::Cleared)
            }
            Err(StoreError::KeyUnavailable(reason)) => {
                tracing::warn!(%reason, "Record cannot be opened, removing it");
                Self::discard(path)?;
                Ok(Wiped::Discarded)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the record file and any SQLite side files next to it.
    /// Returns whether the main file existed.
    pub fn discard(path: &Path) -> Result<bool, StoreError> {
        let existed = remove_if_present(path)?;
        for suffix in SIDE_FILE_SUFFIXES {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            remove_if_present(Path::new(&side))?;
        }
        Ok(existed)
    }

    fn connect(&self) -> Result<Database, StoreError> {
        Database::open(&self.path, &self.hex_key)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.connect()?;
        let value = db
            .conn()
            .query_row(
                "SELECT value FROM secure_prefs WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let db = self.connect()?;
        let now = Utc::now().to_rfc3339();

        let tx = db.conn().unchecked_transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO secure_prefs (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        tx.commit()?;

        tracing::debug!(keys = entries.len(), "Store batch committed");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let db = self.connect()?;
        let removed = db.conn().execute("DELETE FROM secure_prefs", [])?;
        tracing::info!(removed, "Credential store cleared");
        Ok(())
    }

    fn modified_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let db = self.connect()?;
        let stamp: Option<String> = db
            .conn()
            .query_row(
                "SELECT updated_at FROM secure_prefs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match stamp {
            None => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StoreError::Corrupt(format!("bad timestamp for {}: {}", key, e))),
        }
    }
}

// ─── In-Memory Store for Tests ───────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Which failure the next reads should report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Failure {
        KeyUnavailable,
        Io,
    }

    /// Map-backed store that counts committed batches.
    #[derive(Default)]
    pub struct MemoryCredentialStore {
        entries: Mutex<BTreeMap<String, Vec<u8>>>,
        failure: Mutex<Option<Failure>>,
        batches: Mutex<usize>,
    }

    impl MemoryCredentialStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_with(&self, failure: Option<Failure>) {
            *self.failure.lock().unwrap() = failure;
        }

        pub fn batch_count(&self) -> usize {
            *self.batches.lock().unwrap()
        }

        pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
            self.entries.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), StoreError> {
            match *self.failure.lock().unwrap() {
                Some(Failure::KeyUnavailable) => {
                    Err(StoreError::KeyUnavailable("keyring locked".to_string()))
                }
                Some(Failure::Io) => Err(StoreError::IoFailure("disk unavailable".to_string())),
                None => Ok(()),
            }
        }
    }

    impl CredentialStore for MemoryCredentialStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        fn set_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
            self.check()?;
            let mut map = self.entries.lock().unwrap();
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_vec());
            }
            *self.batches.lock().unwrap() += 1;
            Ok(())
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.check()?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
