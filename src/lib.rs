// Sessiongate: Library root
//
// Device-encrypted cookie store, cookie codec, biometric gate and the session
// lifecycle that ties them together, plus the CLI and push token registration.

pub mod cli;
pub mod config;
pub mod cookie;
pub mod enclave;
pub mod error;
pub mod gate;
pub mod registration;
pub mod session;
pub mod store;

pub use error::{Result, SessionGateError};
