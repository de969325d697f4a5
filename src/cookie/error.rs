// Sessiongate: Cookie codec error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// One entry of the blob could not be split into name and value.
    #[error("Malformed cookie entry #{index}: {reason}")]
    Malformed { index: usize, reason: String },

    /// The blob had entries but none of them could be decoded.
    #[error("Cookie blob is undecodable ({skipped} malformed entries, none usable)")]
    Undecodable { skipped: usize },
}
