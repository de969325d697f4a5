// Sessiongate: Store Module
//
// Encrypted key/value persistence for the gate flag and the captured cookie
// blob. Values are encrypted at rest by SQLCipher under a key derived from the
// device master key; the record is always written in a single transaction.

mod db;
mod error;
mod models;
mod repository;

pub use db::Database;
pub use error::StoreError;
pub use models::{CredentialRecord, COOKIE_BLOB_KEY, GATE_ARMED_KEY};
pub use repository::{CredentialStore, SqliteCredentialStore, Wiped};

#[cfg(test)]
pub use repository::mock;
