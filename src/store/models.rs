// Sessiongate: Credential record model
//
// The persisted unit is two keys written together: the gate flag and the
// encoded cookie blob. The blob is never printed; `Debug` only says whether
// one is present.

use std::fmt;

use zeroize::Zeroizing;

use super::{CredentialStore, StoreError};

/// Key of the "a session was captured, require a challenge" flag.
pub const GATE_ARMED_KEY: &str = "gate_armed";

/// Key of the encoded cookie set.
pub const COOKIE_BLOB_KEY: &str = "cookie_blob";

const ARMED: &[u8] = b"1";
const DISARMED: &[u8] = b"0";

/// The gate flag and the cookie blob, as read from the store.
///
/// Well-formed records satisfy `cookie_blob.is_some() == gate_armed`.
pub struct CredentialRecord {
    pub gate_armed: bool,
    cookie_blob: Option<Zeroizing<String>>,
}

impl CredentialRecord {
    /// The record of a store that has never captured a session.
    pub fn empty() -> Self {
        Self {
            gate_armed: false,
            cookie_blob: None,
        }
    }

    /// Read the record, hitting durable storage for both keys.
    pub fn load(store: &dyn CredentialStore) -> Result<Self, StoreError> {
        let gate_armed = match store.get(GATE_ARMED_KEY)? {
            None => false,
            Some(v) if v == ARMED => true,
            Some(v) if v == DISARMED => false,
            Some(v) => {
                return Err(StoreError::Corrupt(format!(
                    "gate flag has unexpected value ({} bytes)",
                    v.len()
                )))
            }
        };

        let cookie_blob = match store.get(COOKIE_BLOB_KEY)? {
            None => None,
            Some(bytes) => Some(Zeroizing::new(String::from_utf8(bytes).map_err(|_| {
                StoreError::Corrupt("cookie blob is not valid UTF-8".to_string())
            })?)),
        };

        Ok(Self {
            gate_armed,
            cookie_blob,
        })
    }

    /// Persist `{gate_armed: true, cookie_blob: blob}` in one atomic write.
    pub fn arm(store: &dyn CredentialStore, blob: &str) -> Result<(), StoreError> {
        store.set_batch(&[(GATE_ARMED_KEY, ARMED), (COOKIE_BLOB_KEY, blob.as_bytes())])?;
        tracing::info!(bytes = blob.len(), "Session captured, gate armed");
        Ok(())
    }

    pub fn has_blob(&self) -> bool {
        self.cookie_blob.is_some()
    }

    /// The blob a challenge would release.
    ///
    /// `Ok(None)` when the gate is not armed (a blob left behind without the
    /// flag is ignored). An armed record without a blob cannot be trusted.
    pub fn armed_blob(&self) -> Result<Option<&str>, StoreError> {
        match (self.gate_armed, self.cookie_blob.as_ref()) {
            (true, Some(blob)) => Ok(Some(blob.as_str())),
            (true, None) => Err(StoreError::Corrupt(
                "gate is armed but no cookie blob is stored".to_string(),
            )),
            (false, _) => Ok(None),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("gate_armed", &self.gate_armed)
            .field(
                "cookie_blob",
                &self.cookie_blob.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MemoryCredentialStore;

    #[test]
    fn test_empty_store_loads_unarmed_record() {
        let store = MemoryCredentialStore::new();
        let record = CredentialRecord::load(&store).unwrap();
        assert!(!record.gate_armed);
        assert!(!record.has_blob());
        assert!(record.armed_blob().unwrap().is_none());
    }

    #[test]
    fn test_arm_writes_both_keys_in_one_batch() {
        let store = MemoryCredentialStore::new();
        CredentialRecord::arm(&store, "sid=abc123; Domain=x; Path=/").unwrap();

        assert_eq!(store.batch_count(), 1);
        let record = CredentialRecord::load(&store).unwrap();
        assert!(record.gate_armed);
        assert_eq!(
            record.armed_blob().unwrap(),
            Some("sid=abc123; Domain=x; Path=/")
        );
    }

    #[test]
    fn test_armed_without_blob_is_corrupt() {
        let store = MemoryCredentialStore::new();
        store.set(GATE_ARMED_KEY, b"1").unwrap();

        let record = CredentialRecord::load(&store).unwrap();
        assert!(matches!(record.armed_blob(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_blob_without_flag_is_not_released() {
        let store = MemoryCredentialStore::new();
        store.set(COOKIE_BLOB_KEY, b"sid=1").unwrap();

        let record = CredentialRecord::load(&store).unwrap();
        assert!(record.has_blob());
        assert!(record.armed_blob().unwrap().is_none());
    }

    #[test]
    fn test_garbage_flag_is_corrupt() {
        let store = MemoryCredentialStore::new();
        store.set(GATE_ARMED_KEY, b"yes").unwrap();
        assert!(matches!(
            CredentialRecord::load(&store),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_non_utf8_blob_is_corrupt() {
        let store = MemoryCredentialStore::new();
        store.set(GATE_ARMED_KEY, b"1").unwrap();
        store.set(COOKIE_BLOB_KEY, &[0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            CredentialRecord::load(&store),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_debug_redacts_blob() {
        let store = MemoryCredentialStore::new();
        CredentialRecord::arm(&store, "sid=topsecret").unwrap();
        let record = CredentialRecord::load(&store).unwrap();

        let out = format!("{:?}", record);
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("topsecret"));
    }
}
