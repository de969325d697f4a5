// Sessiongate: SQLCipher Database Management
//
// Opens the encrypted preferences database. The key is applied via PRAGMA
// before any table is touched, and writes are fully synced so a successful
// commit survives a crash.

use std::path::Path;

use rusqlite::Connection;

use super::StoreError;

/// An open, keyed SQLCipher connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the encrypted database at `path`.
    /// `hex_key` is the hex form of the 32-byte store key.
    pub fn open(path: &Path, hex_key: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "key", format!("x'{}'", hex_key))?;

        // A wrong key only shows up on first read: "file is not a database"
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| {
                StoreError::KeyUnavailable(format!(
                    "{} cannot be decrypted with the device key",
                    path.display()
                ))
            })?;

        let db = Self { conn };
        db.configure()?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Unencrypted in-memory database, for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.configure()?;
        db.run_migrations()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn configure(&self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS secure_prefs (
                key         TEXT PRIMARY KEY,
                value       BLOB NOT NULL,
                updated_at  TEXT NOT NULL
            );
            ",
        )?;

        tracing::debug!("Store schema ready");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
    const KEY_B: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

    #[test]
    fn test_schema_created_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='secure_prefs'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.run_migrations().is_ok());
    }

    #[test]
    fn test_reopen_with_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        Database::open(&path, KEY_A).unwrap();
        assert!(Database::open(&path, KEY_A).is_ok());
    }

    #[test]
    fn test_wrong_key_is_key_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        {
            let db = Database::open(&path, KEY_A).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO secure_prefs (key, value, updated_at) VALUES ('k', x'01', 'now')",
                    [],
                )
                .unwrap();
        }

        match Database::open(&path, KEY_B) {
            Err(StoreError::KeyUnavailable(_)) => {}
            Err(e) => panic!("expected KeyUnavailable, got {e}"),
            Ok(_) => panic!("opening with the wrong key must fail"),
        }
    }
}
