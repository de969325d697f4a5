// Sessiongate: Registration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registration rejected with status {0}")]
    Rejected(u16),
}
