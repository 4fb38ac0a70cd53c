//! Configuration management for PaperLens services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Identity provider token verification
    #[serde(default)]
    pub auth: AuthConfig,

    /// Bibliographic search API
    #[serde(default)]
    pub paper_index: PaperIndexConfig,

    /// Completion API used for paper analysis
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Page/database workspace API used for export
    #[serde(default)]
    pub workspace: WorkspaceConfig,

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

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

/// Which store backs projects and analyses
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// postgres or memory
    #[serde(default = "default_storage_provider")]
    pub provider: StorageProvider,

    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
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

    /// Apply bundled migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs access tokens with
    pub jwt_secret: Option<String>,

    /// Expected `aud` claim
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Lifetime of locally minted tokens (dev tooling and tests)
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperIndexConfig {
    /// Base URL of the graph API
    #[serde(default = "default_paper_index_url")]
    pub base_url: String,

    /// Optional API key sent as `x-api-key`
    pub api_key: Option<String>,

    /// Maximum results per search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Completion provider: openai, mock
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace API
    #[serde(default = "default_workspace_url")]
    pub base_url: String,

    /// Value of the API version header
    #[serde(default = "default_workspace_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name reported in logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
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
fn default_request_timeout() -> u64 { 120 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 100 }
fn default_storage_provider() -> StorageProvider { StorageProvider::Postgres }
fn default_database_url() -> String { "postgres://localhost/paperlens".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_jwt_audience() -> String { "authenticated".to_string() }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_paper_index_url() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_search_limit() -> usize { 10 }
fn default_completion_provider() -> String { "openai".to_string() }
fn default_completion_model() -> String { "gpt-4o-mini".to_string() }
fn default_completion_timeout() -> u64 { 60 }
fn default_workspace_url() -> String { "https://api.notion.com/v1".to_string() }
fn default_workspace_version() -> String { "2022-06-28".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "paperlens".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))

            // e.g., APP__COMPLETION__API_KEY=sk-...
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

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_enabled(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_audience: default_jwt_audience(),
            jwt_expiration_secs: default_jwt_expiration(),
        }
    }
}

impl Default for PaperIndexConfig {
    fn default() -> Self {
        Self {
            base_url: default_paper_index_url(),
            api_key: None,
            search_limit: default_search_limit(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_key: None,
            api_base: None,
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_workspace_url(),
            api_version: default_workspace_version(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            paper_index: PaperIndexConfig::default(),
            completion: CompletionConfig::default(),
            workspace: WorkspaceConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
