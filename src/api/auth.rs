use axum::{
    Json,
    extract::{Request, State},
    http::{Extensions, HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use std::sync::Arc;

use super::client_ip::client_info;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::services::{AuthError, LoginResult};

pub const SESSION_COOKIE: &str = "admin-token";

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: Option<String>,
}

/// Admin gate.
///
/// Accepts the session token from:
/// 1. `admin-token` cookie (set by login)
/// 2. `Authorization: Bearer <token>` header
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&jar, request.headers()).ok_or(AuthError::MissingToken)?;

    let client = client_info(
        request.headers(),
        request.extensions(),
        &state.config().server.trusted_proxy_ips,
    );
    state.auth().verify_token(&token, &client)?;

    tracing::Span::current().record("user_id", "admin");
    Ok(next.run(request).await)
}

fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && !cookie.value().is_empty()
    {
        return Some(cookie.value().to_string());
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    None
}

fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

/// POST /admin/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResult>>), ApiError> {
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("Password is required"))?;

    let client = client_info(
        &headers,
        &extensions,
        &state.config().server.trusted_proxy_ips,
    );

    let result: LoginResult = state.auth().login(&password, &client).await?;

    let cookie = session_cookie(
        result.token.clone(),
        result.expires_in,
        state.config().server.secure_cookies,
    );
    Ok((jar.add(cookie), Json(ApiResponse::success(result))))
}

/// POST /admin/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<ApiResponse<MessageResponse>>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let body = Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }));
    (jar, body)
}
