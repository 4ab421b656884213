use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use std::sync::Arc;
use tracing::warn;

use super::AppState;
use super::client_ip::{peer_addr, rate_limit_key, resolve_client_ip};
use super::types::RateLimitedBody;
use crate::rate_limit::{EndpointClass, RateLimitDecision};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Inbound throttle for one endpoint class.
///
/// Denied requests never reach the handler. The innermost class sets the
/// `X-RateLimit-*` headers of an allowed response; outer classes leave them.
pub async fn enforce(
    State((state, class)): State<(Arc<AppState>, EndpointClass)>,
    req: Request,
    next: Next,
) -> Response {
    let ip = resolve_client_ip(
        req.headers(),
        peer_addr(req.extensions()),
        &state.config().server.trusted_proxy_ips,
    );
    let key = rate_limit_key(ip.as_deref(), req.headers());

    let decision = state.rate_limiter().check(class, &key);

    if !decision.allowed {
        warn!(
            class = %class,
            key = %key,
            retry_after = decision.retry_after_secs(),
            "Rate limit exceeded"
        );
        return rejection(&decision);
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if !headers.contains_key(LIMIT_HEADER) {
        insert_limit_headers(headers, &decision);
    }
    response
}

fn rejection(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs();
    let body = RateLimitedBody::new("Rate limit exceeded. Please try again later.", retry_after);

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    insert_limit_headers(headers, decision);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn insert_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));

    let reset = decision
        .reset_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(RESET_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn rejection_carries_retry_headers() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            used: 6,
            remaining: 0,
            reset_at: Utc::now(),
            reset_in: Duration::from_millis(2500),
        };

        let response = rejection(&decision);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
        assert_eq!(response.headers()[LIMIT_HEADER], "5");
        assert_eq!(response.headers()[REMAINING_HEADER], "0");
        assert!(response.headers().contains_key(RESET_HEADER));
    }
}
