// Sessiongate: Gate state machine
//
//   Bootstrapping ──armed──▶ AwaitingChallenge ──success──▶ Unlocked
//        │                          │
//        └──not armed──▶ Unlocked   └──failure / cancel──▶ Denied
//
// Every challenge carries an attempt number. A result for any attempt other
// than the pending one is stale: it changes nothing and releases nothing.

use super::{ChallengeOutcome, GateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Bootstrapping,
    AwaitingChallenge,
    Unlocked,
    Denied,
}

/// What `begin` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing to protect yet; the session may proceed without a challenge.
    Open,
    /// A challenge must succeed first. Carry `attempt` back into `resolve`.
    ChallengeRequired { attempt: u64 },
}

/// What a challenge outcome did to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unlocked,
    Denied,
    /// The result belongs to an abandoned attempt and was discarded.
    Stale,
}

/// Single-writer gate. Owned by the session lifecycle; nothing else mutates it.
#[derive(Debug)]
pub struct BiometricGate {
    state: GateState,
    attempt: u64,
}

impl Default for BiometricGate {
    fn default() -> Self {
        Self::new()
    }
}

impl BiometricGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Bootstrapping,
            attempt: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// The attempt currently awaiting a result, if any.
    pub fn pending_attempt(&self) -> Option<u64> {
        (self.state == GateState::AwaitingChallenge).then_some(self.attempt)
    }

    /// Start a session attempt. Only valid from `Bootstrapping`.
    pub fn begin(&mut self, armed: bool) -> Result<GateDecision, GateError> {
        match self.state {
            GateState::Bootstrapping => {}
            GateState::AwaitingChallenge => return Err(GateError::Busy),
            from => {
                return Err(GateError::InvalidTransition {
                    from,
                    event: "begin",
                })
            }
        }

        if armed {
            self.attempt += 1;
            self.state = GateState::AwaitingChallenge;
            tracing::debug!(attempt = self.attempt, "Gate awaiting challenge");
            Ok(GateDecision::ChallengeRequired {
                attempt: self.attempt,
            })
        } else {
            self.state = GateState::Unlocked;
            tracing::debug!("Gate open: no captured session to protect");
            Ok(GateDecision::Open)
        }
    }

    /// Apply a challenge outcome for `attempt`.
    pub fn resolve(&mut self, attempt: u64, outcome: ChallengeOutcome) -> Resolution {
        if self.pending_attempt() != Some(attempt) {
            tracing::debug!(attempt, state = ?self.state, "Discarding stale challenge result");
            return Resolution::Stale;
        }

        match outcome {
            ChallengeOutcome::Success => {
                self.state = GateState::Unlocked;
                Resolution::Unlocked
            }
            ChallengeOutcome::Failure | ChallengeOutcome::Cancelled => {
                self.state = GateState::Denied;
                Resolution::Denied
            }
        }
    }

    /// Fail closed: the prior session cannot be trusted or the challenge
    /// could not run.
    pub fn deny(&mut self) {
        self.state = GateState::Denied;
    }

    /// Back to `Bootstrapping`. Any pending attempt becomes stale.
    pub fn reset(&mut self) {
        self.state = GateState::Bootstrapping;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
