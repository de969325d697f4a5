// Sessiongate: Biometric Gate Module
//
// The state machine that decides whether stored cookies may be released, and
// the capability interface of the challenge provider it interprets.

mod error;
mod provider;
mod state;

pub use error::GateError;
pub use provider::{ChallengeOutcome, ChallengeProvider, CommandChallenge};
pub use state::{BiometricGate, GateDecision, GateState, Resolution};

#[cfg(test)]
pub use provider::mock;
