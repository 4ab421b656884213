use std::sync::Arc;
use tracing::debug;

use crate::cache::TtlCache;
use crate::clients::fpl::{FplApi, FplClient, USER_AGENT};
use crate::config::Config;
use crate::db::Store;
use crate::rate_limit::EndpointRateLimiter;
use crate::services::{AdminAuthService, AuthService, FplScoringService, ScoringService};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.upstream.timeout())
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub fpl: Arc<FplClient>,

    pub scoring: Arc<dyn ScoringService>,

    pub auth: Arc<dyn AuthService>,

    pub rate_limiter: Arc<EndpointRateLimiter>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let http_client = build_shared_http_client(&config)?;
        let fpl = Arc::new(FplClient::with_shared_client(
            http_client,
            &config.upstream,
            &config.cache,
        ));

        let scoring = Arc::new(FplScoringService::new(
            store.clone(),
            fpl.clone() as Arc<dyn FplApi>,
        )) as Arc<dyn ScoringService>;

        let auth = Arc::new(AdminAuthService::new(&config.security)) as Arc<dyn AuthService>;

        let rate_limiter = Arc::new(EndpointRateLimiter::new(&config.rate_limits));

        Ok(Self {
            config: Arc::new(config),
            store,
            fpl,
            scoring,
            auth,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn upstream_cache(&self) -> &Arc<TtlCache> {
        self.fpl.cache()
    }

    /// Sweeps expired cache entries, rate-limit windows and login records.
    pub fn purge_expired(&self) {
        let cache = self.upstream_cache().purge_expired();
        let windows = self.rate_limiter.purge_expired();
        let logins = self.auth.purge_expired();
        debug!(cache, windows, logins, "Purged expired in-memory state");
    }
}
