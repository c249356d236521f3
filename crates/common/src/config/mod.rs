//! Configuration management for ScholarSearch services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Layered TOML files: `config/default`, `config/{APP_ENV}`, `config/local`
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Relational database (popularity store, saved items, ranking tables)
    pub database: DatabaseConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Document index configuration
    pub index: IndexConfig,

    /// Translation collaborator
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Search behaviour
    #[serde(default)]
    pub search: SearchConfig,

    /// Ranking batch job
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis URL. Empty disables the shared cache.
    #[serde(default)]
    pub url: String,

    /// Key prefix for namespacing
    #[serde(default = "default_redis_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Elasticsearch base URL
    pub url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_works_index")]
    pub works_index: String,

    #[serde(default = "default_authors_index")]
    pub authors_index: String,

    #[serde(default = "default_institutions_index")]
    pub institutions_index: String,

    #[serde(default = "default_patents_index")]
    pub patents_index: String,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on retrying transient read failures, in milliseconds
    #[serde(default = "default_index_retry_ms")]
    pub max_retry_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_translation_endpoint")]
    pub endpoint: String,

    /// MyMemory style language pair, e.g. `zh|en`
    #[serde(default = "default_langpair")]
    pub langpair: String,

    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Lifetime of a cached result page
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Prefix of every leaderboard table
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Candidate pool pulled for the all-domains leaderboard
    #[serde(default = "default_global_pool")]
    pub global_pool: usize,

    /// Candidate pool pulled per domain
    #[serde(default = "default_domain_pool")]
    pub domain_pool: usize,

    /// Rows kept per leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// Interval of the scheduled runner in seconds (0 runs once and exits)
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret used to identify callers. Unset means every caller is anonymous.
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_prefix() -> String { "scholarsearch".to_string() }
fn default_works_index() -> String { "openalex_works".to_string() }
fn default_authors_index() -> String { "openalex_authors".to_string() }
fn default_institutions_index() -> String { "openalex_institutions".to_string() }
fn default_patents_index() -> String { "patent".to_string() }
fn default_index_timeout() -> u64 { 10 }
fn default_index_retry_ms() -> u64 { 2_000 }
fn default_translation_endpoint() -> String { "https://api.mymemory.translated.net/get".to_string() }
fn default_langpair() -> String { "zh|en".to_string() }
fn default_translation_timeout() -> u64 { 3 }
fn default_cache_ttl() -> u64 { 300 }
fn default_page_size() -> u32 { 10 }
fn default_max_page_size() -> u32 { 100 }
fn default_table_prefix() -> String { "scholar_ranking_".to_string() }
fn default_global_pool() -> usize { 200 }
fn default_domain_pool() -> usize { 100 }
fn default_leaderboard_size() -> usize { 100 }
fn default_schedule_interval() -> u64 { 0 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_translation_endpoint(),
            langpair: default_langpair(),
            timeout_secs: default_translation_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            global_pool: default_global_pool(),
            domain_pool: default_domain_pool(),
            leaderboard_size: default_leaderboard_size(),
            schedule_interval_secs: default_schedule_interval(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("redis.url", "")?
            .set_default("index.url", "http://localhost:9200")?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__INDEX__URL=http://es:9200
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Lifetime of cached search pages
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search.cache_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/scholarsearch".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                key_prefix: default_redis_prefix(),
            },
            index: IndexConfig {
                url: "http://localhost:9200".to_string(),
                username: None,
                password: None,
                works_index: default_works_index(),
                authors_index: default_authors_index(),
                institutions_index: default_institutions_index(),
                patents_index: default_patents_index(),
                timeout_secs: default_index_timeout(),
                max_retry_ms: default_index_retry_ms(),
            },
            translation: TranslationConfig::default(),
            search: SearchConfig::default(),
            ranking: RankingConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
