/// Configuration management for Engagement Service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Auth configuration
    pub auth: AuthConfig,
    /// Engagement tuning knobs
    pub engagement: EngagementConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub http_port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL (redis://host:port)
    pub url: String,
}

/// Auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity module
    pub jwt_secret: String,
}

/// Engagement tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Fallback watch-time threshold for the legacy view path (seconds)
    #[serde(default = "default_view_threshold_secs")]
    pub view_threshold_secs: u32,
    /// Progress at which an ended session counts as a completion
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f32,
    /// A session without progress for this long is treated as ended
    #[serde(default = "default_session_stale_minutes")]
    pub session_stale_minutes: i64,
    /// Interval between cache reconciliation passes (seconds)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_view_threshold_secs() -> u32 {
    30
}

fn default_completion_threshold() -> f32 {
    0.9
}

fn default_session_stale_minutes() -> i64 {
    30
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8087), // engagement-service default HTTP port
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_connections),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_min_connections),
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").context("REDIS_URL environment variable not set")?,
        };

        let auth = AuthConfig {
            jwt_secret: std::env::var("JWT_SECRET")
                .context("JWT_SECRET environment variable not set")?,
        };

        let engagement = EngagementConfig {
            view_threshold_secs: std::env::var("VIEW_THRESHOLD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_view_threshold_secs),
            completion_threshold: std::env::var("COMPLETION_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_completion_threshold),
            session_stale_minutes: std::env::var("SESSION_STALE_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_session_stale_minutes),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_reconcile_interval_secs),
        };

        Ok(Config {
            app,
            database,
            redis,
            auth,
            engagement,
        })
    }
}
