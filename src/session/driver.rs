// Sessiongate: Session Driver
//
// Owns the `SessionLifecycle` on one tokio task. Callers talk to it through
// a cloneable `SessionHandle`; challenge results come back on a second
// channel as messages, so the lifecycle never shares mutable state with a
// callback. Status changes are published on a watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{SessionError, SessionLifecycle, SessionStatus, TrustSignal};
use crate::gate::{ChallengeOutcome, ChallengeProvider, GateError};

/// Capacity of the event queue between handles and the driver.
const EVENT_QUEUE_DEPTH: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;
type ChallengeResult = (u64, Result<ChallengeOutcome, GateError>);

enum SessionEvent {
    Activate(Reply<SessionStatus>),
    LoginCompleted(Reply<bool>),
    PageLoaded(Reply<bool>),
    CancelChallenge,
    Trust(TrustSignal),
}

pub struct SessionDriver {
    lifecycle: SessionLifecycle,
    challenger: Arc<dyn ChallengeProvider>,
    results_tx: mpsc::UnboundedSender<ChallengeResult>,
    pending: Option<JoinHandle<()>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionDriver {
    /// Start the driver task. It runs until the session terminates or every
    /// handle is dropped.
    pub fn spawn(
        lifecycle: SessionLifecycle,
        challenger: Arc<dyn ChallengeProvider>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(lifecycle.status());

        let driver = Self {
            lifecycle,
            challenger,
            results_tx,
            pending: None,
            status_tx,
        };
        let task = tokio::spawn(driver.run(events_rx, results_rx));

        let handle = SessionHandle {
            events: events_tx,
            status: status_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        mut results: mpsc::UnboundedReceiver<ChallengeResult>,
    ) {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some((attempt, result)) = results.recv() => {
                    if self.lifecycle.pending_attempt() == Some(attempt) {
                        self.pending = None;
                    }
                    if let Err(e) = self.lifecycle.complete_challenge(attempt, result) {
                        tracing::error!(error = %e, "Restoring session failed");
                    }
                }
            }

            self.publish();
            if matches!(self.lifecycle.status(), SessionStatus::Terminated(_)) {
                break;
            }
        }

        self.abort_pending();
        tracing::debug!(status = ?self.lifecycle.status(), "Session driver stopped");
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Activate(reply) => {
                let result = self.lifecycle.activate();
                if let Ok(SessionStatus::AwaitingChallenge { attempt }) = result {
                    self.dispatch_challenge(attempt);
                }
                self.publish();
                let _ = reply.send(result);
            }
            SessionEvent::LoginCompleted(reply) => {
                let result = self.lifecycle.login_completed();
                self.publish();
                let _ = reply.send(result);
            }
            SessionEvent::PageLoaded(reply) => {
                let result = self.lifecycle.page_loaded();
                self.publish();
                let _ = reply.send(result);
            }
            SessionEvent::CancelChallenge => {
                self.abort_pending();
                if let Err(e) = self.lifecycle.cancel_challenge() {
                    tracing::error!(error = %e, "Cancelling challenge failed");
                }
            }
            SessionEvent::Trust(signal) => {
                self.abort_pending();
                self.lifecycle.trust_lost(signal);
            }
        }
    }

    /// Run the challenge off the driver task; its outcome comes back as a
    /// message tagged with the attempt it belongs to.
    fn dispatch_challenge(&mut self, attempt: u64) {
        let challenger = Arc::clone(&self.challenger);
        let results = self.results_tx.clone();

        self.abort_pending();
        self.pending = Some(tokio::spawn(async move {
            let result = challenger.start_challenge().await;
            let _ = results.send((attempt, result));
        }));
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
            tracing::debug!("Pending challenge abandoned");
        }
    }

    fn publish(&self) {
        let status = self.lifecycle.status();
        self.status_tx.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// Cloneable front door to a running session driver.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Start (or restart after a lock) the session. Returns the status right
    /// after startup: `AwaitingChallenge` means a challenge is now running.
    pub async fn activate(&self) -> Result<SessionStatus, SessionError> {
        self.request(SessionEvent::Activate).await
    }

    /// Report that the user finished logging in. Returns whether a session
    /// was captured.
    pub async fn login_completed(&self) -> Result<bool, SessionError> {
        self.request(SessionEvent::LoginCompleted).await
    }

    /// Report a completed page load.
    pub async fn page_loaded(&self) -> Result<bool, SessionError> {
        self.request(SessionEvent::PageLoaded).await
    }

    pub async fn cancel_challenge(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::CancelChallenge).await
    }

    pub async fn device_locked(&self) -> Result<(), SessionError> {
        self.trust(TrustSignal::DeviceLocked).await
    }

    pub async fn trust(&self, signal: TrustSignal) -> Result<(), SessionError> {
        self.send(SessionEvent::Trust(signal)).await
    }

    /// Latest published status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Wait until the status satisfies `done`. Fails with `Closed` if the
    /// driver stops first without ever reaching such a status.
    pub async fn wait_for(
        &self,
        done: impl FnMut(&SessionStatus) -> bool,
    ) -> Result<SessionStatus, SessionError> {
        let mut status = self.status.clone();
        let reached = status.wait_for(done).await.map_err(|_| SessionError::Closed)?;
        Ok(*reached)
    }

    /// Wait until no challenge is pending. The status a reply carries is
    /// already published, so calling this right after `activate` is safe.
    /// `Idle` here means restoring hit a retryable store failure.
    pub async fn settled(&self) -> Result<SessionStatus, SessionError> {
        self.wait_for(|s| !matches!(s, SessionStatus::AwaitingChallenge { .. }))
            .await
    }

    async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.events.send(event).await.map_err(|_| SessionError::Closed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionEvent,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}

/// Forward trust signals from a platform source into the session.
/// Ends when the source closes or the session stops.
pub fn spawn_trust_monitor(
    mut source: mpsc::Receiver<TrustSignal>,
    handle: SessionHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = source.recv().await {
            tracing::debug!(?signal, "Trust signal received");
            if handle.trust(signal).await.is_err() {
                break;
            }
        }
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapturePolicy;
    use crate::cookie::{self, Cookie, CookieSet};
    use crate::gate::mock::ScriptedChallenge;
    use crate::session::{CookieJarHost, LiveSessionHost, TerminationReason};
    use crate::store::mock::MemoryCredentialStore;
    use crate::store::CredentialRecord;

    fn sid() -> CookieSet {
        std::iter::once(Cookie::new("sid", "abc123", "x")).collect()
    }

    fn armed_store() -> Arc<MemoryCredentialStore> {
        let store = Arc::new(MemoryCredentialStore::new());
        CredentialRecord::arm(store.as_ref(), &cookie::encode(&sid())).unwrap();
        store
    }

    fn spawn_with(
        store: Arc<MemoryCredentialStore>,
        host: Arc<CookieJarHost>,
        challenger: Arc<ScriptedChallenge>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let lifecycle = SessionLifecycle::new(store, host, "x", CapturePolicy::LoginSignal);
        SessionDriver::spawn(lifecycle, challenger)
    }

    #[tokio::test]
    async fn test_unarmed_session_never_challenges() {
        let host = Arc::new(CookieJarHost::new());
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Failure));
        let (handle, _task) = spawn_with(
            Arc::new(MemoryCredentialStore::new()),
            host.clone(),
            challenger.clone(),
        );

        let status = handle.activate().await.unwrap();
        assert_eq!(status, SessionStatus::Active { restored: false });
        assert_eq!(challenger.started(), 0);
    }

    #[tokio::test]
    async fn test_challenge_success_restores_cookies() {
        let host = Arc::new(CookieJarHost::new());
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Success));
        let (handle, _task) = spawn_with(armed_store(), host.clone(), challenger.clone());

        assert!(matches!(
            handle.activate().await.unwrap(),
            SessionStatus::AwaitingChallenge { .. }
        ));
        let status = handle.settled().await.unwrap();

        assert_eq!(status, SessionStatus::Active { restored: true });
        assert_eq!(host.snapshot(), sid());
        assert_eq!(challenger.started(), 1);
    }

    #[tokio::test]
    async fn test_challenge_failure_terminates_and_stops_driver() {
        let host = Arc::new(CookieJarHost::new());
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Failure));
        let (handle, task) = spawn_with(armed_store(), host.clone(), challenger);

        handle.activate().await.unwrap();
        let status = handle.settled().await.unwrap();

        assert_eq!(
            status,
            SessionStatus::Terminated(TerminationReason::ChallengeFailed)
        );
        assert!(host.is_empty());
        task.await.unwrap();
        assert!(matches!(
            handle.activate().await,
            Err(SessionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_provider_error_terminates() {
        let (challenger, script) = ScriptedChallenge::new();
        script
            .send(Err(GateError::ProviderUnavailable("no sensor".to_string())))
            .unwrap();
        let host = Arc::new(CookieJarHost::new());
        let (handle, _task) = spawn_with(armed_store(), host.clone(), Arc::new(challenger));

        handle.activate().await.unwrap();
        assert_eq!(
            handle.settled().await.unwrap(),
            SessionStatus::Terminated(TerminationReason::ProviderUnavailable)
        );
        assert!(host.is_empty());
    }

    #[tokio::test]
    async fn test_lock_while_challenge_pending_wins() {
        let (challenger, script) = ScriptedChallenge::new();
        let challenger = Arc::new(challenger);
        let store = armed_store();
        let before = store.snapshot();
        let host = Arc::new(CookieJarHost::new());
        let (handle, _task) = spawn_with(store.clone(), host.clone(), challenger.clone());

        handle.activate().await.unwrap();
        handle.device_locked().await.unwrap();
        assert_eq!(
            handle.wait_for(|s| *s == SessionStatus::Locked).await.unwrap(),
            SessionStatus::Locked
        );

        // the abandoned prompt answering late changes nothing
        let _ = script.send(Ok(ChallengeOutcome::Success));
        tokio::task::yield_now().await;
        assert_eq!(handle.status(), SessionStatus::Locked);
        assert!(host.is_empty());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_lock_after_restore_wipes_live_cookies_only() {
        let host = Arc::new(CookieJarHost::new());
        let store = armed_store();
        let before = store.snapshot();
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Success));
        let (handle, _task) = spawn_with(store.clone(), host.clone(), challenger);

        handle.activate().await.unwrap();
        handle.settled().await.unwrap();
        assert_eq!(host.snapshot(), sid());

        handle.device_locked().await.unwrap();
        handle.wait_for(|s| *s == SessionStatus::Locked).await.unwrap();
        assert!(host.is_empty());
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_reactivation_after_lock_challenges_again() {
        let (challenger, script) = ScriptedChallenge::new();
        let challenger = Arc::new(challenger);
        let host = Arc::new(CookieJarHost::new());
        let (handle, _task) = spawn_with(armed_store(), host.clone(), challenger.clone());

        script.send(Ok(ChallengeOutcome::Success)).unwrap();
        handle.activate().await.unwrap();
        handle.settled().await.unwrap();

        handle.device_locked().await.unwrap();
        handle.wait_for(|s| *s == SessionStatus::Locked).await.unwrap();

        script.send(Ok(ChallengeOutcome::Success)).unwrap();
        assert!(matches!(
            handle.activate().await.unwrap(),
            SessionStatus::AwaitingChallenge { .. }
        ));
        handle
            .wait_for(|s| *s == SessionStatus::Active { restored: true })
            .await
            .unwrap();
        assert_eq!(challenger.started(), 2);
        assert_eq!(host.snapshot(), sid());
    }

    #[tokio::test]
    async fn test_user_cancel_terminates() {
        let (challenger, _script) = ScriptedChallenge::new();
        let host = Arc::new(CookieJarHost::new());
        let (handle, _task) = spawn_with(armed_store(), host.clone(), Arc::new(challenger));

        handle.activate().await.unwrap();
        handle.cancel_challenge().await.unwrap();

        assert_eq!(
            handle.settled().await.unwrap(),
            SessionStatus::Terminated(TerminationReason::ChallengeCancelled)
        );
        assert!(host.is_empty());
    }

    #[tokio::test]
    async fn test_second_activation_while_pending_is_busy() {
        let (challenger, _script) = ScriptedChallenge::new();
        let (handle, _task) = spawn_with(
            armed_store(),
            Arc::new(CookieJarHost::new()),
            Arc::new(challenger),
        );

        handle.activate().await.unwrap();
        assert!(matches!(
            handle.activate().await,
            Err(SessionError::Gate(GateError::Busy))
        ));
    }

    #[tokio::test]
    async fn test_first_run_login_capture_through_handle() {
        let store = Arc::new(MemoryCredentialStore::new());
        let host = Arc::new(CookieJarHost::new());
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Failure));
        let (handle, _task) = spawn_with(store.clone(), host.clone(), challenger);

        handle.activate().await.unwrap();
        host.inject_cookies(sid());
        assert!(!handle.page_loaded().await.unwrap());
        assert!(handle.login_completed().await.unwrap());

        let record = CredentialRecord::load(store.as_ref()).unwrap();
        assert!(record.gate_armed);
        assert_eq!(handle.status(), SessionStatus::Active { restored: false });
    }

    #[tokio::test]
    async fn test_trust_monitor_forwards_lock() {
        let host = Arc::new(CookieJarHost::new());
        let challenger = Arc::new(ScriptedChallenge::answering(ChallengeOutcome::Failure));
        let (handle, _task) = spawn_with(
            Arc::new(MemoryCredentialStore::new()),
            host.clone(),
            challenger,
        );
        handle.activate().await.unwrap();
        host.inject_cookies(sid());

        let (signals, source) = mpsc::channel(4);
        let monitor = spawn_trust_monitor(source, handle.clone());
        signals.send(TrustSignal::DeviceLocked).await.unwrap();

        handle.wait_for(|s| *s == SessionStatus::Locked).await.unwrap();
        assert!(host.is_empty());

        drop(signals);
        monitor.await.unwrap();
    }
}
