use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::{AppState, ComponentHealth, HealthResponse};
use crate::clients::fpl::{FplApi, HealthStatus};

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    /// Also probe the upstream API.
    #[serde(default)]
    pub upstream: bool,
}

/// GET /health
///
/// 200 when every probed component is up, 503 otherwise.
pub async fn health(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HealthQuery>,
) -> Response {
    let database = match state.store().ping().await {
        Ok(()) => ComponentHealth {
            status: "ok".to_string(),
            error: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            ComponentHealth {
                status: "error".to_string(),
                error: Some("Database unreachable".to_string()),
            }
        }
    };

    let upstream = if query.upstream {
        let health = state.fpl().health().await;
        Some(match health.status {
            HealthStatus::Ok => ComponentHealth {
                status: "ok".to_string(),
                error: None,
            },
            HealthStatus::Error => ComponentHealth {
                status: "error".to_string(),
                error: Some(health.message),
            },
        })
    } else {
        None
    };

    let healthy = database.error.is_none()
        && upstream.as_ref().is_none_or(|u| u.error.is_none());

    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        database,
        upstream,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}
