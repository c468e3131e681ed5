//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `APP_LAYOUT_`, nested keys separated by `__`)
//! 2. The config file passed on the command line (default `./config.toml`)
//! 3. Default values
//!
//! ```toml
//! [service]
//! name = "app-layout"
//!
//! [server.http]
//! addr = "0.0.0.0:8000"
//!
//! [health]
//! check_timeout_ms = 800
//!
//! [[health.probes]]
//! name = "db"
//! kind = "tcp"
//! address = "127.0.0.1:5432"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "APP_LAYOUT_";

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "./config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service identity
    #[serde(default)]
    pub service: ServiceConfig,

    /// Transport servers
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,

    /// Health aggregation
    #[serde(default)]
    pub health: HealthConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, reported by the status endpoint
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            environment: default_environment(),
        }
    }
}

/// Transport server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub grpc: GrpcConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_http_addr")]
    pub addr: SocketAddr,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_http_addr(),
            timeout_secs: default_timeout(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

impl HttpConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get body limit in bytes
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }
}

/// gRPC server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    /// Enable gRPC server
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address
    #[serde(default = "default_grpc_addr")]
    pub addr: SocketAddr,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum message size in MB
    #[serde(default = "default_grpc_max_message_mb")]
    pub max_message_size_mb: usize,

    /// HTTP/2 keepalive ping interval in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Maximum concurrent streams per connection
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: u32,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_grpc_addr(),
            timeout_secs: default_timeout(),
            max_message_size_mb: default_grpc_max_message_mb(),
            keepalive_secs: default_keepalive_secs(),
            max_concurrent_streams: default_max_concurrent_streams(),
        }
    }
}

impl GrpcConfig {
    /// Get max message size in bytes
    pub fn max_message_size_bytes(&self) -> usize {
        self.max_message_size_mb * 1024 * 1024
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get keepalive interval as Duration
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files; stdout when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Log file name, defaults to `<service>.log`
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            dir: None,
            filename: None,
            rotation: LogRotation::default(),
        }
    }
}

/// Health aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout in milliseconds
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// Dependency probes, in report order
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: default_check_timeout_ms(),
            probes: Vec::new(),
        }
    }
}

impl HealthConfig {
    /// Get the per-probe timeout as Duration
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

/// A configured dependency probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Name shown in readiness messages and status reports
    pub name: String,

    #[serde(flatten)]
    pub kind: ProbeKind,
}

/// Built-in probe kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeKind {
    /// TCP connect check against `host:port`
    Tcp { address: String },

    /// HTTP GET check; any 2xx passes unless `expect_status` is set
    Http {
        url: String,
        #[serde(default)]
        expect_status: Option<u16>,
    },
}

// Default value functions
fn default_service_name() -> String {
    "app-layout".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9000))
}

fn default_timeout() -> u64 {
    30
}

fn default_body_limit_mb() -> usize {
    10 // 10 MB
}

fn default_true() -> bool {
    true
}

fn default_grpc_max_message_mb() -> usize {
    50 // 50 MB
}

fn default_keepalive_secs() -> u64 {
    40
}

fn default_max_concurrent_streams() -> u32 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_check_timeout_ms() -> u64 {
    800
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file is not an error: defaults and environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
        } else {
            tracing::warn!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Config = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered figment used by [`Config::load_from`]
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Load from config file (if exists)
            .merge(Toml::file(path))
            // Override with environment variables
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject configurations the health aggregator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.health.check_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "health.check_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for probe in &self.health.probes {
            if probe.name.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "health probe names must not be empty".to_string(),
                ));
            }
            if !seen.insert(probe.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate health probe name: {}",
                    probe.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.name, "app-layout");
        assert_eq!(config.server.http.addr.port(), 8000);
        assert_eq!(config.server.grpc.addr.port(), 9000);
        assert_eq!(config.server.grpc.max_message_size_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.health.check_timeout(), Duration::from_millis(800));
        assert!(config.health.probes.is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.service.name, "app-layout");
    }

    #[test]
    fn test_load_probes_from_file() {
        let file = write_config(
            r#"
            [service]
            name = "orders"

            [health]
            check_timeout_ms = 250

            [[health.probes]]
            name = "db"
            kind = "tcp"
            address = "127.0.0.1:5432"

            [[health.probes]]
            name = "search"
            kind = "http"
            url = "http://127.0.0.1:9200/_cluster/health"
            expect_status = 200
            "#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "orders");
        assert_eq!(config.health.check_timeout_ms, 250);
        assert_eq!(
            config.health.probes,
            vec![
                ProbeConfig {
                    name: "db".to_string(),
                    kind: ProbeKind::Tcp {
                        address: "127.0.0.1:5432".to_string()
                    },
                },
                ProbeConfig {
                    name: "search".to_string(),
                    kind: ProbeKind::Http {
                        url: "http://127.0.0.1:9200/_cluster/health".to_string(),
                        expect_status: Some(200),
                    },
                },
            ]
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let file = write_config("[service\nname = ");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_probe_names_rejected() {
        let file = write_config(
            r#"
            [[health.probes]]
            name = "db"
            kind = "tcp"
            address = "127.0.0.1:5432"

            [[health.probes]]
            name = "db"
            kind = "tcp"
            address = "127.0.0.1:5433"
            "#,
        );

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/config.toml");
        let config = Config::load_from(path).unwrap();

        assert_eq!(config.log.rotation, LogRotation::Daily);
        let names: Vec<&str> = config.health.probes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["db", "cache"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.health.check_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_log_format_parsing() {
        let file = write_config(
            r#"
            [log]
            level = "debug"
            format = "pretty"
            dir = "/var/log/app"
            rotation = "daily"
            "#,
        );

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.rotation, LogRotation::Daily);
        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/app")));
    }
}
