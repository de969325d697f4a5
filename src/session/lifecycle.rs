// Sessiongate: Session Lifecycle
//
// Single-writer core of the gate. Sequencing:
//   activate            read record; armed -> wipe live session + challenge,
//                       unarmed -> open bootstrap
//   complete_challenge  success -> re-read, decode, clear + inject; else terminate
//   login_completed     capture live cookies, arm the record in one write
//   trust_lost          wipe the live session, reset the gate; record untouched
//
// Any path that cannot establish trust ends the session. None of them ever
// lets stored cookies into the live session without a passed challenge.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::{LiveSessionHost, SessionError, TerminationReason, TrustSignal};
use crate::config::CapturePolicy;
use crate::cookie;
use crate::gate::{BiometricGate, ChallengeOutcome, GateDecision, GateError, GateState, Resolution};
use crate::store::{CredentialRecord, CredentialStore, StoreError};

/// Externally visible phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not started, or a startup that hit a retryable store failure.
    Idle,
    AwaitingChallenge { attempt: u64 },
    /// Live session running. `restored` is true when stored cookies were
    /// released into it, false for an unauthenticated first-run bootstrap.
    Active { restored: bool },
    /// Trust was lost; the next activation starts over.
    Locked,
    /// Ended for good. The protected view must close.
    Terminated(TerminationReason),
}

pub struct SessionLifecycle {
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn LiveSessionHost>,
    gate: BiometricGate,
    domain: String,
    capture_policy: CapturePolicy,
    status: SessionStatus,
}

impl SessionLifecycle {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn LiveSessionHost>,
        domain: impl Into<String>,
        capture_policy: CapturePolicy,
    ) -> Self {
        Self {
            store,
            host,
            gate: BiometricGate::new(),
            domain: domain.into(),
            capture_policy,
            status: SessionStatus::Idle,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn pending_attempt(&self) -> Option<u64> {
        self.gate.pending_attempt()
    }

    // ─── Startup ─────────────────────────────────────────────────────────────

    /// Run the startup sequence up to the point where a challenge is needed.
    ///
    /// Returns `AwaitingChallenge` when the caller must dispatch a challenge
    /// and report it through `complete_challenge`. A store I/O failure is
    /// returned as an error and leaves the session `Idle` for a retry.
    pub fn activate(&mut self) -> Result<SessionStatus, SessionError> {
        if let SessionStatus::Terminated(reason) = self.status {
            return Err(SessionError::Terminated(reason));
        }
        match self.gate.state() {
            GateState::Unlocked => return Ok(self.status),
            GateState::AwaitingChallenge => return Err(GateError::Busy.into()),
            GateState::Bootstrapping | GateState::Denied => {}
        }

        let record = match CredentialRecord::load(self.store.as_ref()) {
            Ok(record) => record,
            Err(e @ StoreError::IoFailure(_)) => {
                tracing::warn!(error = %e, "Could not read credential record, activation can be retried");
                return Err(e.into());
            }
            Err(e) => return Ok(self.fail_closed(&e)),
        };

        let armed = match record.armed_blob() {
            Ok(blob) => blob.is_some(),
            Err(e) => return Ok(self.fail_closed(&e)),
        };

        self.status = match self.gate.begin(armed)? {
            GateDecision::Open => {
                tracing::info!("No captured session, starting unauthenticated bootstrap");
                SessionStatus::Active { restored: false }
            }
            GateDecision::ChallengeRequired { attempt } => {
                // nothing may stay live while the gate is closed
                self.host.clear_live_session();
                tracing::info!(attempt, "Captured session found, biometric challenge required");
                SessionStatus::AwaitingChallenge { attempt }
            }
        };
        Ok(self.status)
    }

    /// Apply the result of challenge `attempt`.
    ///
    /// Results that arrive after a lock, or for an attempt that is no longer
    /// pending, are discarded as denied: they neither unlock nor terminate.
    pub fn complete_challenge(
        &mut self,
        attempt: u64,
        result: Result<ChallengeOutcome, GateError>,
    ) -> Result<SessionStatus, SessionError> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if self.gate.pending_attempt() == Some(attempt) => {
                tracing::error!(error = %e, "Challenge could not run, refusing to release session");
                return Ok(self.terminate(TerminationReason::ProviderUnavailable));
            }
            Err(_) => ChallengeOutcome::Failure,
        };

        match self.gate.resolve(attempt, outcome) {
            Resolution::Stale => {
                tracing::info!(attempt, "Late challenge result discarded");
                Ok(self.status)
            }
            Resolution::Denied => {
                let reason = match outcome {
                    ChallengeOutcome::Cancelled => TerminationReason::ChallengeCancelled,
                    _ => TerminationReason::ChallengeFailed,
                };
                Ok(self.terminate(reason))
            }
            Resolution::Unlocked => self.restore(),
        }
    }

    /// User dismissed the pending challenge.
    pub fn cancel_challenge(&mut self) -> Result<SessionStatus, SessionError> {
        match self.gate.pending_attempt() {
            Some(attempt) => self.complete_challenge(attempt, Ok(ChallengeOutcome::Cancelled)),
            None => Ok(self.status),
        }
    }

    fn restore(&mut self) -> Result<SessionStatus, SessionError> {
        // Read again: the copy seen at activation may be stale by now
        let record = match CredentialRecord::load(self.store.as_ref()) {
            Ok(record) => record,
            Err(e @ StoreError::IoFailure(_)) => {
                tracing::warn!(error = %e, "Could not re-read credential record after unlock");
                self.gate.reset();
                self.status = SessionStatus::Idle;
                return Err(e.into());
            }
            Err(e) => return Ok(self.fail_closed(&e)),
        };

        let blob = match record.armed_blob() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::info!("Record was wiped while the challenge was pending");
                self.status = SessionStatus::Active { restored: false };
                return Ok(self.status);
            }
            Err(e) => return Ok(self.fail_closed(&e)),
        };

        let cookies = match cookie::decode(blob) {
            Ok(cookies) => cookies,
            Err(e) => return Ok(self.fail_closed(&e)),
        };

        self.host.clear_live_session();
        let count = cookies.len();
        self.host.inject_cookies(cookies);
        tracing::info!(cookies = count, "Session restored after biometric unlock");

        self.status = SessionStatus::Active { restored: true };
        Ok(self.status)
    }

    // ─── Capture ─────────────────────────────────────────────────────────────

    /// An explicit signal that the user finished logging in.
    /// Returns whether a session was captured.
    pub fn login_completed(&mut self) -> Result<bool, SessionError> {
        self.capture()
    }

    /// A page finished loading. Only captures under
    /// `CapturePolicy::AnyPageLoad`.
    pub fn page_loaded(&mut self) -> Result<bool, SessionError> {
        match self.capture_policy {
            CapturePolicy::AnyPageLoad => self.capture(),
            CapturePolicy::LoginSignal => Ok(false),
        }
    }

    fn capture(&mut self) -> Result<bool, SessionError> {
        if !self.gate.is_unlocked() {
            tracing::debug!(state = ?self.gate.state(), "Ignoring login signal, gate not unlocked");
            return Ok(false);
        }

        let cookies = self.host.current_cookies(&self.domain);
        if cookies.is_empty() {
            tracing::debug!(domain = %self.domain, "No cookies for domain yet, nothing to capture");
            return Ok(false);
        }

        let blob = Zeroizing::new(cookie::encode(&cookies));
        CredentialRecord::arm(self.store.as_ref(), &blob)?;
        tracing::info!(domain = %self.domain, cookies = cookies.len(), "Login captured");
        Ok(true)
    }

    // ─── Trust loss ──────────────────────────────────────────────────────────

    /// Wipe the live session. The encrypted record is not touched.
    pub fn trust_lost(&mut self, signal: TrustSignal) -> SessionStatus {
        match signal {
            TrustSignal::DeviceLocked => {
                self.host.clear_live_session();
                self.gate.reset();
                if !matches!(self.status, SessionStatus::Terminated(_)) {
                    self.status = SessionStatus::Locked;
                }
                tracing::info!("Device locked, live session cleared");
            }
        }
        self.status
    }

    // ─── Termination ─────────────────────────────────────────────────────────

    fn fail_closed(&mut self, cause: &dyn std::fmt::Display) -> SessionStatus {
        tracing::warn!(error = %cause, "Prior session cannot be trusted");
        self.terminate(TerminationReason::UntrustedRecord)
    }

    fn terminate(&mut self, reason: TerminationReason) -> SessionStatus {
        self.gate.deny();
        self.host.clear_live_session();
        self.status = SessionStatus::Terminated(reason);
        tracing::warn!(%reason, "Session terminated");
        self.status
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
