// Sessiongate: Push Token Registration
//
// Tells the site's backend which push token belongs to which identities, so
// it can notify this device. Purely informational to the session core: the
// call runs on its own task and a failure is logged and dropped.

mod error;
mod http;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

pub use error::RegistrationError;
pub use http::HttpRegistration;

#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Register `push_token` for the given identities.
    async fn register(&self, push_token: &str, identities: &[String])
        -> Result<(), RegistrationError>;
}

/// Run one registration in the background. No retries; the returned handle
/// only exists so a short-lived process can wait for the call to finish.
pub fn spawn_registration(
    service: Arc<dyn RegistrationService>,
    push_token: String,
    identities: Vec<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match service.register(&push_token, &identities).await {
            Ok(()) => tracing::info!(identities = identities.len(), "Push token registered"),
            Err(e) => tracing::warn!(error = %e, "Push token registration failed"),
        }
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
