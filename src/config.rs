//! Client configuration

use std::time::Duration;

/// Configuration for connecting to the hosted gateway
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Base URL of the gateway, without a trailing slash
    pub base_url: String,
    /// Publishable API key sent with every request
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Cache tuning
    pub cache: CacheConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            cache: CacheConfig::default(),
        }
    }
}

/// Query cache tuning
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served without revalidation
    pub fresh_ttl: Duration,
    /// How long past freshness an entry may still be served while a
    /// background revalidation runs
    pub stale_ttl: Duration,
    /// Maximum number of cached queries before oldest-first eviction
    pub max_entries: usize,
    /// Interval for the background expiry sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: Duration::from_secs(300),
            stale_ttl: Duration::from_secs(3600),
            max_entries: 10_000,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}
