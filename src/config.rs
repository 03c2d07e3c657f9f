use std::str::FromStr;
use std::time::Duration;

use crate::limiter::LimiterConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub limiter: LimiterConfig,
    /// Hours of validity per scope.
    pub activation_ttl_hours: i64,
    pub authentication_ttl_hours: i64,
    /// Key namespaces for the fingerprint entries and the per-identity index.
    pub cache_hash_prefix: String,
    pub cache_identity_prefix: String,
    /// How many proxy hops in front of this service are trusted when
    /// recovering the real client address from forwarding headers.
    pub trusted_hops: usize,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: env_or("AUTHGATE_PORT", 4020),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/authgate".into()),
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        db_max_connections: env_or("AUTHGATE_DB_MAX_CONNS", 25),
        limiter: LimiterConfig {
            enabled: env_or("AUTHGATE_LIMITER_ENABLED", true),
            requests_per_second: env_or("AUTHGATE_LIMITER_RPS", 2.0),
            burst: env_or("AUTHGATE_LIMITER_BURST", 4),
            sweep_interval: Duration::from_secs(env_or("AUTHGATE_LIMITER_SWEEP_SECS", 60)),
            idle_after: Duration::from_secs(env_or("AUTHGATE_LIMITER_IDLE_SECS", 180)),
        },
        activation_ttl_hours: env_or("AUTHGATE_ACTIVATION_TTL_HOURS", 72),
        authentication_ttl_hours: env_or("AUTHGATE_AUTHENTICATION_TTL_HOURS", 24),
        cache_hash_prefix: std::env::var("AUTHGATE_CACHE_HASH_PREFIX")
            .unwrap_or_else(|_| "tokens:hash".into()),
        cache_identity_prefix: std::env::var("AUTHGATE_CACHE_IDENTITY_PREFIX")
            .unwrap_or_else(|_| "tokens:identity".into()),
        trusted_hops: env_or("AUTHGATE_TRUSTED_HOPS", 0),
    })
}

/// Parse an env var, falling back to the default when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
