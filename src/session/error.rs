// Sessiongate: Session error types

use std::fmt;

use thiserror::Error;

use crate::gate::GateError;
use crate::store::StoreError;

/// Why a session was ended. Every one of these means no stored cookie
/// reached the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    ChallengeFailed,
    ChallengeCancelled,
    /// The challenge provider could not run a challenge.
    ProviderUnavailable,
    /// The stored record could not be decrypted or decoded.
    UntrustedRecord,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ChallengeFailed => "biometric challenge failed",
            Self::ChallengeCancelled => "biometric challenge cancelled",
            Self::ProviderUnavailable => "biometric challenge unavailable",
            Self::UntrustedRecord => "stored session cannot be trusted",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Session terminated: {0}")]
    Terminated(TerminationReason),

    #[error("Session driver has stopped")]
    Closed,
}
