//! Signed, time-limited admin session tokens (HS256 JWT).

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::auth_service::AuthError;
use crate::config::MAX_SESSION_TTL_SECONDS;

pub const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// Address the session was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub issued_at: i64,
    pub expires_at: i64,
    pub ip: Option<String>,
}

#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: TimeDelta,
}

impl SessionManager {
    /// `ttl_seconds` is capped at [`MAX_SESSION_TTL_SECONDS`].
    #[must_use]
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        let ttl = i64::try_from(ttl_seconds.min(MAX_SESSION_TTL_SECONDS))
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::zero());

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, ip: Option<&str>) -> Result<IssuedSession, AuthError> {
        self.issue_at(Utc::now(), ip)
    }

    fn issue_at(&self, now: DateTime<Utc>, ip: Option<&str>) -> Result<IssuedSession, AuthError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("Session expiry out of range".to_string()))?;
        let claims = SessionClaims {
            sub: ADMIN_SUBJECT.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: format!("{:032x}", rand::rng().random::<u128>()),
            ip: ip.map(str::to_string),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign session token: {e}")))?;

        Ok(IssuedSession {
            token,
            expires_at,
            ttl_seconds: self.ttl.num_seconds(),
        })
    }

    /// Checks signature and expiry.
    ///
    /// A request from a different address than the issuing one is logged and accepted.
    pub fn verify(&self, token: &str, request_ip: Option<&str>) -> Result<AdminSession, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?
            .claims;

        if claims.sub != ADMIN_SUBJECT {
            return Err(AuthError::TokenInvalid);
        }

        if let (Some(session_ip), Some(request_ip)) = (claims.ip.as_deref(), request_ip)
            && session_ip != request_ip
        {
            warn!(
                session_ip,
                request_ip, "Admin session used from a different address"
            );
        }

        Ok(AdminSession {
            issued_at: claims.iat,
            expires_at: claims.exp,
            ip: claims.ip,
        })
    }
}

/// Compares `input` against `expected` in time proportional to `input.len()`.
///
/// Every input byte is visited even when the lengths differ.
#[must_use]
pub fn constant_time_eq(input: &[u8], expected: &[u8]) -> bool {
    let mut diff = u8::from(input.len() != expected.len());
    for (i, byte) in input.iter().enumerate() {
        let other = expected.get(i).copied().unwrap_or(0);
        diff |= byte ^ other;
    }
    diff == 0
}
