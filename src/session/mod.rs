// Sessiongate: Session Lifecycle Module
//
// Orchestrates store, codec and gate: captures cookies after a first login,
// restores them after a passed challenge, and wipes the live session when the
// device stops being trusted. `SessionLifecycle` is the single-writer core;
// `SessionDriver` owns it on a tokio task and feeds it events.

mod driver;
mod error;
mod host;
mod lifecycle;
mod trust;

pub use driver::{spawn_trust_monitor, SessionDriver, SessionHandle};
pub use error::{SessionError, TerminationReason};
pub use host::{CookieJarHost, LiveSessionHost};
pub use lifecycle::{SessionLifecycle, SessionStatus};
pub use trust::TrustSignal;
