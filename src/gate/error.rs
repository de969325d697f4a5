// Sessiongate: Gate error types

use thiserror::Error;

use super::GateState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The biometric provider cannot run a challenge. Never read as
    /// "no gate required".
    #[error("Challenge provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A startup sequence is already waiting on a challenge.
    #[error("A challenge is already pending")]
    Busy,

    #[error("Invalid gate transition from {from:?} on {event}")]
    InvalidTransition { from: GateState, event: &'static str },
}
