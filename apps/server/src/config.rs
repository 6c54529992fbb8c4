//! Server configuration
//!
//! Configuration is layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. `config/default.toml`
//! 3. `config/{SIEVE_ENV}.toml` (`SIEVE_ENV` defaults to `development`)
//! 4. an explicit file from `--config <path>` or `SIEVE_CONFIG_FILE`
//! 5. environment variables prefixed `SIEVE__`, e.g. `SIEVE__CLUSTER__URL`
//!
//! A `.env` file in the working directory is read first.

use clap::Parser;
use serde::Deserialize;
use sieve_query::{PaginationMode, PaginationSettings, ViewDefinition};
use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "SIEVE";

/// Command line arguments of the server binary.
#[derive(Debug, Clone, Default, Parser)]
#[clap(name = "sieve-server", about = "REST search views over a search cluster", version)]
pub struct Cli {
    /// Extra configuration file, applied after the environment-specific one.
    #[clap(long = "config", env = "SIEVE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cluster: ClusterConfig,
    pub pagination: PaginationConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub views: Vec<ViewEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_request_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            max_request_body_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
    /// The index setting `index.max_result_window`.
    pub max_result_window: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            timeout_seconds: 30,
            max_result_window: 10_000,
        }
    }
}

impl ClusterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// HMAC key for cursor tokens.
    pub cursor_secret: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            cursor_secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// `daily`, `hourly`, `minutely` or `never`.
    pub file_rotation: String,
    pub opentelemetry_enabled: bool,
    pub otlp_endpoint: String,
    pub otlp_timeout_seconds: u64,
    pub trace_sample_ratio: f64,
    pub service_name: String,
    pub service_version: Option<String>,
    pub deployment_environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "sieve".to_string(),
            file_rotation: "daily".to_string(),
            opentelemetry_enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            otlp_timeout_seconds: 10,
            trace_sample_ratio: 1.0,
            service_name: "sieve".to_string(),
            service_version: None,
            deployment_environment: "development".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    AllowAny,
    ApiKey,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: PermissionMode,
    pub api_keys: Vec<String>,
    pub header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: PermissionMode::AllowAny,
            api_keys: Vec::new(),
            header: "x-api-key".to_string(),
        }
    }
}

/// Per-object rule: the document's `_source` value at `field` must equal `equals`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectPermission {
    pub field: String,
    pub equals: serde_json::Value,
}

/// One `[[views]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewEntry {
    /// Overrides `[auth] mode` for this view.
    #[serde(default)]
    pub permission: Option<PermissionMode>,
    #[serde(default)]
    pub object_permission: Option<ObjectPermission>,
    #[serde(flatten)]
    pub definition: ViewDefinition,
}

impl Config {
    /// Load configuration from `.env`, files, the command line and the environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(Cli::parse())
    }

    pub fn load_with(cli: Cli) -> anyhow::Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let env = std::env::var("SIEVE_ENV").unwrap_or_else(|_| "development".to_string());
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false));
        if let Some(path) = &cli.config_file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .with_list_parse_key("auth.api_keys")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".into());
        }
        if self.server.max_request_body_size == 0 {
            return Err("server.max_request_body_size must be greater than 0".into());
        }
        if self.pagination.default_page_size == 0 {
            return Err("pagination.default_page_size must be greater than 0".into());
        }
        if self.pagination.max_page_size < self.pagination.default_page_size {
            return Err("pagination.max_page_size must be >= pagination.default_page_size".into());
        }
        if self.cluster.max_result_window == 0 {
            return Err("cluster.max_result_window must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.logging.trace_sample_ratio) {
            return Err("logging.trace_sample_ratio must be within 0.0..=1.0".into());
        }
        if self.auth.mode == PermissionMode::ApiKey && self.auth.api_keys.is_empty() {
            return Err("auth.api_keys must not be empty when auth.mode = api_key".into());
        }

        let mut names = HashSet::new();
        for view in &self.views {
            let name = &view.definition.name;
            if !names.insert(name.as_str()) {
                return Err(format!("duplicate view name '{name}'"));
            }
            if view.permission == Some(PermissionMode::ApiKey) && self.auth.api_keys.is_empty() {
                return Err(format!("view '{name}' requires api keys but auth.api_keys is empty"));
            }
        }

        let needs_secret = self
            .views
            .iter()
            .any(|v| v.definition.pagination_class == PaginationMode::Cursor);
        let has_secret = self
            .pagination
            .cursor_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty());
        if needs_secret && !has_secret {
            return Err("pagination.cursor_secret is required by views using cursor pagination".into());
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        (self.server.host.as_str(), self.server.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("no address for {}:{}", self.server.host, self.server.port))
    }

    pub fn pagination_settings(&self) -> PaginationSettings {
        PaginationSettings {
            default_page_size: self.pagination.default_page_size,
            max_page_size: self.pagination.max_page_size,
            max_result_window: self.cluster.max_result_window,
        }
    }
}
