//! Admin authentication: password login, lockout and session tokens.

use serde::Serialize;
use thiserror::Error;

use super::session::AdminSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid admin password")]
    InvalidCredentials,

    #[error("Too many failed login attempts")]
    LockedOut { retry_after_secs: u64 },

    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid or expired authentication token")]
    TokenInvalid,

    #[error("Invalid or expired authentication token")]
    TokenExpired,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Where a login attempt comes from.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Resolved client address, if any.
    pub ip: Option<String>,
}

impl ClientInfo {
    /// Key the login throttle counts failures under.
    #[must_use]
    pub fn throttle_key(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: String,
    pub expires_in: i64,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Checks the admin password and issues a session token.
    ///
    /// # Errors
    ///
    /// [`AuthError::LockedOut`] while the client is throttled,
    /// [`AuthError::InvalidCredentials`] on a wrong password.
    async fn login(&self, password: &str, client: &ClientInfo) -> Result<LoginResult, AuthError>;

    /// Validates a session token presented by a client.
    fn verify_token(&self, token: &str, client: &ClientInfo) -> Result<AdminSession, AuthError>;

    /// Drops expired throttle records.
    fn purge_expired(&self) -> usize;
}
