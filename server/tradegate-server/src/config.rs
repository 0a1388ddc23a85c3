use serde::{Deserialize, Serialize};

/// Gateway configuration, environment-driven with sane defaults.
///
/// Window sizes are milliseconds to match the rate-limiter granularity;
/// credential TTLs are seconds since they end up in JWT `exp` claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,

    pub general_max_requests_per_window: u32,
    pub general_window_ms: u64,
    pub max_login_attempts_per_window: u32,
    pub login_window_ms: u64,
    pub max_refresh_attempts_per_window: u32,
    pub refresh_window_ms: u64,

    pub cookie_secure: bool,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub session_cookie: String,
    pub remember_cookie: String,

    /// Upper bound on any single identity-store call. On timeout the
    /// request fails closed.
    pub identity_timeout_ms: u64,

    /// Development mode exposes error detail in responses.
    pub development_mode: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            issuer: "tradegate".to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,

            general_max_requests_per_window: 100,
            general_window_ms: 60_000,
            max_login_attempts_per_window: 5,
            login_window_ms: 60_000,
            max_refresh_attempts_per_window: 10,
            refresh_window_ms: 60_000,

            cookie_secure: false,
            access_cookie: "tg_access".to_string(),
            refresh_cookie: "tg_refresh".to_string(),
            session_cookie: "tg_session".to_string(),
            remember_cookie: "tg_remember".to_string(),

            identity_timeout_ms: 2_000,

            development_mode: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            jwt_secret: env_or("TRADEGATE_JWT_SECRET", defaults.jwt_secret),
            issuer: env_or("TRADEGATE_ISSUER", defaults.issuer),
            access_token_ttl_secs: env_parsed("TRADEGATE_ACCESS_TTL_SECS", defaults.access_token_ttl_secs),
            refresh_token_ttl_secs: env_parsed("TRADEGATE_REFRESH_TTL_SECS", defaults.refresh_token_ttl_secs),

            general_max_requests_per_window: env_parsed(
                "TRADEGATE_GENERAL_MAX_REQUESTS",
                defaults.general_max_requests_per_window,
            ),
            general_window_ms: env_parsed("TRADEGATE_GENERAL_WINDOW_MS", defaults.general_window_ms),
            max_login_attempts_per_window: env_parsed(
                "TRADEGATE_MAX_LOGIN_ATTEMPTS",
                defaults.max_login_attempts_per_window,
            ),
            login_window_ms: env_parsed("TRADEGATE_LOGIN_WINDOW_MS", defaults.login_window_ms),
            max_refresh_attempts_per_window: env_parsed(
                "TRADEGATE_MAX_REFRESH_ATTEMPTS",
                defaults.max_refresh_attempts_per_window,
            ),
            refresh_window_ms: env_parsed("TRADEGATE_REFRESH_WINDOW_MS", defaults.refresh_window_ms),

            cookie_secure: env_parsed("TRADEGATE_COOKIE_SECURE", defaults.cookie_secure),
            access_cookie: env_or("TRADEGATE_ACCESS_COOKIE", defaults.access_cookie),
            refresh_cookie: env_or("TRADEGATE_REFRESH_COOKIE", defaults.refresh_cookie),
            session_cookie: env_or("TRADEGATE_SESSION_COOKIE", defaults.session_cookie),
            remember_cookie: env_or("TRADEGATE_REMEMBER_COOKIE", defaults.remember_cookie),

            identity_timeout_ms: env_parsed("TRADEGATE_IDENTITY_TIMEOUT_MS", defaults.identity_timeout_ms),

            development_mode: std::env::var("TRADEGATE_ENV")
                .map(|v| v == "development")
                .unwrap_or(defaults.development_mode),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
