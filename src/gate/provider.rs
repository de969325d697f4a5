// Sessiongate: Challenge Provider
//
// The biometric challenge is an opaque platform capability. The gate only
// sees one of three outcomes, or an error saying the capability is missing.
// Timeouts belong to the provider; a challenge with no answer stays pending.

use async_trait::async_trait;
use tokio::process::Command;

use super::GateError;

/// Result of one biometric challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Success,
    Failure,
    Cancelled,
}

/// A biometric (or equivalent) challenge the user must pass.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    /// Run one challenge to completion.
    ///
    /// The future may be dropped at any point; implementations must tear
    /// down their prompt when that happens.
    async fn start_challenge(&self) -> Result<ChallengeOutcome, GateError>;
}

// ─── External verifier program ───────────────────────────────────────────────

/// Default verifier: fprintd's fingerprint check.
const DEFAULT_VERIFIER: &str = "fprintd-verify";

/// Exit status of a verifier interrupted with Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// Runs an external verifier and maps its exit status:
/// 0 is success, 130 or death by signal is a cancel, anything else a failure.
/// A verifier that cannot be spawned means the provider is unavailable.
#[derive(Debug, Clone)]
pub struct CommandChallenge {
    program: String,
    args: Vec<String>,
}

impl CommandChallenge {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for CommandChallenge {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFIER)
    }
}

fn outcome_from_exit(code: Option<i32>) -> ChallengeOutcome {
    match code {
        Some(0) => ChallengeOutcome::Success,
        Some(EXIT_INTERRUPTED) | None => ChallengeOutcome::Cancelled,
        Some(_) => ChallengeOutcome::Failure,
    }
}

#[async_trait]
impl ChallengeProvider for CommandChallenge {
    async fn start_challenge(&self) -> Result<ChallengeOutcome, GateError> {
        tracing::info!(verifier = %self.program, "Starting biometric challenge");

        let status = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                GateError::ProviderUnavailable(format!("cannot run {}: {}", self.program, e))
            })?;

        let outcome = outcome_from_exit(status.code());
        tracing::info!(?outcome, code = ?status.code(), "Biometric challenge finished");
        Ok(outcome)
    }
}

// ─── Scripted Provider for Tests ─────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
