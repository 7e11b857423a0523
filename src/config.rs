//! Configuration management.

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration (durable event stream)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Live feed configuration
    #[serde(default)]
    pub live_feed: LiveFeedConfig,

    /// Auth token verification configuration
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Stream resource events are appended to
    #[serde(default = "default_event_stream")]
    pub event_stream: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            event_stream: default_event_stream(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveFeedConfig {
    /// Per-subscriber broadcast buffer capacity
    #[serde(default = "default_feed_capacity")]
    pub capacity: usize,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_feed_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to verify bearer tokens issued by the identity
    /// service. Token issuance is not this service's concern.
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 20 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_event_stream() -> String { crate::notify::DEFAULT_STREAM.to_string() }
fn default_feed_capacity() -> usize { 256 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

impl Config {
    /// Load configuration from an optional file plus environment variables.
    ///
    /// The file path comes from `RESMAN_CONFIG` (default `resman.toml` in the
    /// working directory) and may be absent; environment variables override
    /// file values.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("RESMAN_CONFIG").unwrap_or_else(|_| "resman".to_string());
        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(config::Environment::with_prefix("RESMAN").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_layers_file_values_over_defaults() {
        let path = std::env::temp_dir().join(format!("resman-test-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [server]
            port = 9090

            [database]
            url = "postgres://db/resman"

            [auth]
            jwt_secret = "test-secret"
            "#,
        )
        .unwrap();

        std::env::set_var("RESMAN_CONFIG", &path);
        let cfg = Config::load().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.database.url, "postgres://db/resman");
        assert_eq!(cfg.auth.jwt_secret, "test-secret");
        // Sections absent from the file keep their defaults.
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.live_feed.capacity, 256);
        assert_eq!(cfg.redis.event_stream, crate::notify::DEFAULT_STREAM);
    }
}
