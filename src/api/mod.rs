use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::fpl::FplClient;
use crate::config::Config;
use crate::db::Store;
use crate::rate_limit::{EndpointClass, EndpointRateLimiter};
use crate::services::{AuthService, ScoringService};
use crate::state::SharedState;

pub mod auth;
mod client_ip;
mod error;
mod observability;
mod rate_limit;
mod registrations;
mod scoring;
mod system;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn fpl(&self) -> &Arc<FplClient> {
        &self.shared.fpl
    }

    #[must_use]
    pub fn scoring(&self) -> &Arc<dyn ScoringService> {
        &self.shared.scoring
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<EndpointRateLimiter> {
        &self.shared.rate_limiter
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(fpl_routes(state.clone()))
        .merge(registration_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .route("/health", get(system::health))
        .layer(middleware::from_fn_with_state(
            (state.clone(), EndpointClass::Global),
            rate_limit::enforce,
        ));

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .route("/metrics", get(observability::get_metrics))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn fpl_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/fpl/weekly", get(scoring::weekly_points))
        .route("/leaderboard", get(scoring::weekly_leaderboard))
        .route("/monthly", get(scoring::monthly_leaderboard))
        .route_layer(middleware::from_fn_with_state(
            (state, EndpointClass::Fpl),
            rate_limit::enforce,
        ))
}

fn registration_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/registrations", post(registrations::register))
        .route_layer(middleware::from_fn_with_state(
            (state, EndpointClass::Registration),
            rate_limit::enforce,
        ))
}

fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            patch(users::update_user_status).delete(users::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .merge(protected)
        .route("/admin/login", post(auth::login))
        .route("/admin/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(
            (state, EndpointClass::Admin),
            rate_limit::enforce,
        ))
}
