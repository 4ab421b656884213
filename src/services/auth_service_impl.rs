//! In-process implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::SecondsFormat;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::services::auth_service::{AuthError, AuthService, ClientInfo, LoginResult};
use crate::services::login_throttle::LoginThrottle;
use crate::services::session::{AdminSession, SessionManager, constant_time_eq};

pub struct AdminAuthService {
    admin_password: String,
    throttle: LoginThrottle,
    sessions: SessionManager,
}

impl AdminAuthService {
    #[must_use]
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            admin_password: security.admin_password.clone(),
            throttle: LoginThrottle::new(
                security.login_max_attempts,
                Duration::from_secs(security.login_window_seconds),
            ),
            sessions: SessionManager::new(
                &security.signing_secret(),
                security.session_ttl_seconds,
            ),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[async_trait]
impl AuthService for AdminAuthService {
    async fn login(&self, password: &str, client: &ClientInfo) -> Result<LoginResult, AuthError> {
        let key = client.throttle_key();

        if !self.throttle.try_begin(key) {
            let retry_after_secs = ceil_secs(self.throttle.remaining_lockout(key));
            metrics::counter!("admin_login_total", "outcome" => "locked_out").increment(1);
            warn!(client = key, retry_after_secs, "Admin login blocked by lockout");
            return Err(AuthError::LockedOut { retry_after_secs });
        }

        let valid = !self.admin_password.is_empty()
            && constant_time_eq(password.as_bytes(), self.admin_password.as_bytes());
        if !valid {
            metrics::counter!("admin_login_total", "outcome" => "failure").increment(1);
            warn!(client = key, "Admin login failed");
            return Err(AuthError::InvalidCredentials);
        }

        self.throttle.record_attempt(key, true);

        let issued = self.sessions.issue(client.ip.as_deref())?;
        metrics::counter!("admin_login_total", "outcome" => "success").increment(1);
        info!(client = key, "Admin logged in");

        Ok(LoginResult {
            token: issued.token,
            expires_at: issued
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            expires_in: issued.ttl_seconds,
        })
    }

    fn verify_token(&self, token: &str, client: &ClientInfo) -> Result<AdminSession, AuthError> {
        self.sessions.verify(token, client.ip.as_deref())
    }

    fn purge_expired(&self) -> usize {
        self.throttle.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AdminAuthService {
        AdminAuthService::new(&SecurityConfig {
            admin_password: "correct-horse".to_string(),
            ..SecurityConfig::default()
        })
    }

    fn client(ip: &str) -> ClientInfo {
        ClientInfo {
            ip: Some(ip.to_string()),
        }
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let auth = service();
        let result = auth.login("correct-horse", &client("10.0.0.1")).await.unwrap();
        assert_eq!(result.expires_in, 3600);
        assert!(auth.verify_token(&result.token, &client("10.0.0.1")).is_ok());
    }

    #[tokio::test]
    async fn wrong_password_then_lockout() {
        let auth = service();
        let who = client("10.0.0.7");

        for _ in 0..5 {
            assert_eq!(
                auth.login("wrong", &who).await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }

        match auth.login("correct-horse", &who).await {
            Err(AuthError::LockedOut { retry_after_secs }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 900);
            }
            other => panic!("expected lockout, got {other:?}"),
        }

        assert!(auth.login("correct-horse", &client("10.0.0.8")).await.is_ok());
    }

    #[tokio::test]
    async fn empty_configured_password_never_matches() {
        let auth = AdminAuthService::new(&SecurityConfig::default());
        assert_eq!(
            auth.login("", &ClientInfo::default()).await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }
}
