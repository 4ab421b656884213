use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub upstream: UpstreamConfig,

    pub cache: CacheConfig,

    pub rate_limits: RateLimitConfig,

    pub registration: RegistrationConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/fplcup.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the admin session cookie.
    /// Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Proxies allowed to supply `X-Forwarded-For` / `X-Real-IP`.
    ///
    /// When empty, forwarded headers are ignored and the socket peer address
    /// identifies the client.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            secure_cookies: true,
            trusted_proxy_ips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,

    /// Per-request timeout in milliseconds (env: `FPL_API_TIMEOUT_MS`)
    pub timeout_ms: u64,

    /// Attempts per logical request, including the first one
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    pub backoff_base_ms: u64,

    /// Outbound calls allowed per window, across all upstream endpoints
    pub rate_limit_requests: usize,

    pub rate_limit_window_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fantasy.premierleague.com/api".to_string(),
            timeout_ms: 10_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            rate_limit_requests: 10,
            rate_limit_window_seconds: 60,
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for season reference data (env: `FPL_CACHE_TTL_SECONDS`)
    pub static_ttl_seconds: u64,

    /// TTL for per-entry score history
    pub history_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_ttl_seconds: 300,
            history_ttl_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowLimit {
    pub requests: u32,
    pub window_seconds: u64,
}

impl WindowLimit {
    #[must_use]
    pub const fn new(requests: u32, window_seconds: u64) -> Self {
        Self {
            requests,
            window_seconds,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Applied to every API route (env: `RATE_LIMIT_REQUESTS`, `RATE_LIMIT_WINDOW_MS`)
    pub global: WindowLimit,

    /// Leaderboards and weekly points
    pub fpl: WindowLimit,

    /// User management and admin login
    pub admin: WindowLimit,

    pub registration: WindowLimit,

    /// How often expired windows are swept
    pub cleanup_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global: WindowLimit::new(100, 15 * 60),
            fpl: WindowLimit::new(30, 60),
            admin: WindowLimit::new(10, 60),
            registration: WindowLimit::new(5, 5 * 60),
            cleanup_interval_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Look the entry up upstream before accepting a registration
    pub verify_entry: bool,
}

/// Upper bound for `security.session_ttl_seconds` (30 days).
pub const MAX_SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared admin secret (env: `ADMIN_PASSWORD`). Must be at least 8 characters.
    pub admin_password: String,

    /// Key for signing session tokens. Derived from the admin password when unset.
    pub session_secret: Option<String>,

    pub session_ttl_seconds: u64,

    /// Failed logins allowed per client within the window before lockout.
    pub login_max_attempts: u32,

    pub login_window_seconds: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            admin_password: String::new(),
            session_secret: None,
            session_ttl_seconds: 3600,
            login_max_attempts: 5,
            login_window_seconds: 15 * 60,
        }
    }
}

impl SecurityConfig {
    /// Signing key for session tokens.
    ///
    /// Without an explicit secret the admin password is cut or padded to 32 bytes.
    #[must_use]
    pub fn signing_secret(&self) -> String {
        self.session_secret.clone().unwrap_or_else(|| {
            let mut secret: String = self.admin_password.chars().take(32).collect();
            while secret.len() < 32 {
                secret.push('0');
            }
            secret
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "fplcup".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            rate_limits: RateLimitConfig::default(),
            registration: RegistrationConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Environment lookup, abstracted so overrides can be tested without
/// touching the process environment.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl<S: std::hash::BuildHasher> EnvSource for std::collections::HashMap<String, String, S> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from: {}", path.display());
        }

        let mut config = Self::load_file()?;
        config.apply_env(&ProcessEnv)?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_env(&mut self, env: &impl EnvSource) -> Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{key}: expected a number, got '{value}'"))
        }

        if let Some(url) = env.var("DATABASE_URL") {
            self.general.database_path = url;
        }
        if let Some(password) = env.var("ADMIN_PASSWORD") {
            self.security.admin_password = password;
        }
        if let Some(v) = env.var("RATE_LIMIT_REQUESTS") {
            self.rate_limits.global.requests = parse("RATE_LIMIT_REQUESTS", &v)?;
        }
        if let Some(v) = env.var("RATE_LIMIT_WINDOW_MS") {
            let ms: u64 = parse("RATE_LIMIT_WINDOW_MS", &v)?;
            self.rate_limits.global.window_seconds = (ms / 1000).max(1);
        }
        if let Some(v) = env.var("FPL_API_TIMEOUT_MS") {
            self.upstream.timeout_ms = parse("FPL_API_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env.var("FPL_CACHE_TTL_SECONDS") {
            self.cache.static_ttl_seconds = parse("FPL_CACHE_TTL_SECONDS", &v)?;
        }
        if let Some(v) = env.var("PORT") {
            self.server.port = parse("PORT", &v)?;
        }

        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fplcup").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fplcup").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Collects every configuration problem instead of stopping at the first.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.general.database_path.is_empty() {
            errors.push("general.database_path: DATABASE_URL is required".to_string());
        }

        if self.security.admin_password.chars().count() < 8 {
            errors.push(
                "security.admin_password: ADMIN_PASSWORD must be at least 8 characters"
                    .to_string(),
            );
        }

        if self.security.session_ttl_seconds == 0 {
            errors.push("security.session_ttl_seconds must be > 0".to_string());
        } else if self.security.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            errors.push(format!(
                "security.session_ttl_seconds must be <= {MAX_SESSION_TTL_SECONDS}"
            ));
        }

        if self.security.login_max_attempts == 0 || self.security.login_window_seconds == 0 {
            errors.push("security.login_* limits must be > 0".to_string());
        }

        if url::Url::parse(&self.upstream.base_url).is_err() {
            errors.push(format!(
                "upstream.base_url: invalid URL '{}'",
                self.upstream.base_url
            ));
        }

        if self.upstream.max_retries == 0 {
            errors.push("upstream.max_retries must be > 0".to_string());
        }

        if self.upstream.rate_limit_requests == 0 || self.upstream.rate_limit_window_seconds == 0 {
            errors.push("upstream.rate_limit_* must be > 0".to_string());
        }

        for (name, limit) in [
            ("global", self.rate_limits.global),
            ("fpl", self.rate_limits.fpl),
            ("admin", self.rate_limits.admin),
            ("registration", self.rate_limits.registration),
        ] {
            if limit.requests == 0 || limit.window_seconds == 0 {
                errors.push(format!("rate_limits.{name}: requests and window must be > 0"));
            }
        }

        errors
    }

    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            return Ok(());
        }

        for error in &errors {
            warn!("Invalid configuration: {error}");
        }
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "))
    }

    /// Config with secrets masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.security.admin_password.is_empty() {
            config.security.admin_password = "********".to_string();
        }
        if config.security.session_secret.is_some() {
            config.security.session_secret = Some("********".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.upstream.max_retries, 3);
        assert_eq!(config.upstream.rate_limit_requests, 10);
        assert_eq!(config.cache.static_ttl_seconds, 300);
        assert_eq!(config.cache.history_ttl_seconds, 120);
        assert_eq!(config.rate_limits.fpl, WindowLimit::new(30, 60));
        assert_eq!(config.rate_limits.registration, WindowLimit::new(5, 300));
        assert_eq!(config.security.login_max_attempts, 5);
        assert_eq!(config.security.login_window_seconds, 900);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[upstream]"));
        assert!(toml_str.contains("[rate_limits.fpl]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [rate_limits.admin]
            requests = 3
            window_seconds = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.rate_limits.admin, WindowLimit::new(3, 30));
        assert_eq!(config.rate_limits.fpl, WindowLimit::new(30, 60));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<String, String> = [
            ("ADMIN_PASSWORD", "correct-horse"),
            ("RATE_LIMIT_REQUESTS", "42"),
            ("RATE_LIMIT_WINDOW_MS", "60000"),
            ("FPL_API_TIMEOUT_MS", "2500"),
            ("FPL_CACHE_TTL_SECONDS", "30"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = Config::default();
        config.apply_env(&env).unwrap();

        assert_eq!(config.security.admin_password, "correct-horse");
        assert_eq!(config.rate_limits.global, WindowLimit::new(42, 60));
        assert_eq!(config.upstream.timeout_ms, 2500);
        assert_eq!(config.cache.static_ttl_seconds, 30);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let env: HashMap<String, String> =
            [("FPL_API_TIMEOUT_MS".to_string(), "soon".to_string())].into();

        let mut config = Config::default();
        assert!(config.apply_env(&env).is_err());
    }

    #[test]
    fn test_validation_requires_admin_password() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.security.admin_password = "short".to_string();
        assert_eq!(config.validation_errors().len(), 1);

        config.security.admin_password = "long-enough".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds_session_ttl() {
        let mut config = Config::default();
        config.security.admin_password = "long-enough".to_string();

        config.security.session_ttl_seconds = MAX_SESSION_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.security.session_ttl_seconds = u64::MAX;
        let errors = config.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("session_ttl_seconds"));
    }

    #[test]
    fn test_signing_secret_padding() {
        let mut security = SecurityConfig {
            admin_password: "hunter22".to_string(),
            ..SecurityConfig::default()
        };
        assert_eq!(security.signing_secret(), format!("hunter22{}", "0".repeat(24)));

        security.session_secret = Some("explicit".to_string());
        assert_eq!(security.signing_secret(), "explicit");
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = Config::default();
        config.security.admin_password = "super-secret".to_string();
        let shown = config.redacted();
        assert_eq!(shown.security.admin_password, "********");
    }
}
