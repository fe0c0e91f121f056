//! Configuration for the demo server
//!
//! Sources, lowest precedence first:
//! - Default values
//! - Configuration file (`fedauth.toml`, or the path in `FEDAUTH_CONFIG_FILE`)
//! - Environment variables with the `FEDAUTH` prefix, e.g. `FEDAUTH__SERVER__PORT`
//! - `HOST`, `PORT` and `RUST_LOG`

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use fedauth_identity_openid::{AxAttribute, MAX_NONCE_AGE_SECONDS};
use fedauth_session::MAX_SESSION_TTL_SECONDS;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tracing::{debug, info};

/// Smallest accepted cookie secret, in bytes
pub const MIN_COOKIE_SECRET_LEN: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub openid: OpenIdSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: IpAddr,

    /// Port to bind to (default: 3000)
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Google Apps domain. When set, Federated Login is used and only
    /// accounts of this domain get in.
    pub domain: Option<String>,

    /// Prefix for the login and logout routes
    pub url_prefix: String,

    /// Public base URL, needed behind a proxy that rewrites `Host`
    pub external_url: Option<String>,

    /// Key for the session cookie. Empty means a random key per process.
    /// Never written out by `--check-config`.
    #[serde(skip_serializing)]
    pub cookie_secret: String,

    pub secure_cookies: bool,

    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIdSettings {
    /// Overrides the Google endpoint
    pub endpoint: Option<String>,

    /// Attributes to request: name, email, language, username
    pub ask_for: Vec<String>,

    pub http_timeout_seconds: u64,

    pub nonce_max_age_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            domain: None,
            url_prefix: String::new(),
            external_url: None,
            cookie_secret: String::new(),
            secure_cookies: false,
            session_ttl_seconds: 86400, // 24 hours
        }
    }
}

impl Default for OpenIdSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            ask_for: AxAttribute::default_set()
                .iter()
                .map(ToString::to_string)
                .collect(),
            http_timeout_seconds: 30,
            nonce_max_age_seconds: 300,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl OpenIdSettings {
    pub fn attributes(&self) -> Result<Vec<AxAttribute>> {
        self.ask_for
            .iter()
            .map(|name| name.parse::<AxAttribute>().context("Invalid openid.ask_for entry"))
            .collect()
    }
}

impl Config {
    /// Load configuration from environment and optional config file
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_path = match config_file {
            Some(path) => path.to_path_buf(),
            None => std::env::var("FEDAUTH_CONFIG_FILE")
                .unwrap_or_else(|_| "fedauth.toml".to_string())
                .into(),
        };

        if config_path.exists() {
            info!("Loading configuration from {}", config_path.display());
            builder = builder.add_source(File::from(config_path.as_path()));
        } else if config_file.is_some() {
            anyhow::bail!("Config file {} does not exist", config_path.display());
        } else {
            debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("FEDAUTH")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("openid.ask_for")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut settings: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            info!("Using HOST environment variable");
            self.server.host = host.parse().context("Invalid HOST value")?;
        }

        if let Ok(port) = std::env::var("PORT") {
            info!("Using PORT environment variable");
            self.server.port = port.parse().context("Invalid PORT value")?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            info!("Using RUST_LOG environment variable");
            self.logging.level = log_level;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        let secret_len = self.auth.cookie_secret.len();
        if secret_len != 0 && secret_len < MIN_COOKIE_SECRET_LEN {
            anyhow::bail!(
                "Cookie secret must be at least {} bytes, got {}",
                MIN_COOKIE_SECRET_LEN,
                secret_len
            );
        }

        let ttl = self.auth.session_ttl_seconds;
        if ttl == 0 || ttl > MAX_SESSION_TTL_SECONDS {
            anyhow::bail!(
                "Session TTL must be between 1 and {} seconds, got {}",
                MAX_SESSION_TTL_SECONDS,
                ttl
            );
        }

        if self.openid.http_timeout_seconds == 0 {
            anyhow::bail!("OpenID HTTP timeout must be positive");
        }

        let nonce_age = self.openid.nonce_max_age_seconds;
        if nonce_age == 0 || nonce_age > MAX_NONCE_AGE_SECONDS {
            anyhow::bail!(
                "OpenID nonce max age must be between 1 and {} seconds, got {}",
                MAX_NONCE_AGE_SECONDS,
                nonce_age
            );
        }

        self.openid.attributes()?;

        if !self.is_filter_directive() {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            let level_lower = self.logging.level.to_lowercase();
            if !valid_levels.contains(&level_lower.as_str()) {
                anyhow::bail!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level,
                    valid_levels
                );
            }
        }

        let valid_formats = ["pretty", "json", "compact"];
        let format_lower = self.logging.format.to_lowercase();
        if !valid_formats.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        Ok(())
    }

    /// Effective configuration as pretty JSON, without the cookie secret
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server.host, self.server.port))
    }

    fn is_filter_directive(&self) -> bool {
        self.logging.level.contains('=') || self.logging.level.contains(',')
    }

    /// Get the log filter string for tracing
    pub fn log_filter(&self) -> String {
        if self.is_filter_directive() {
            self.logging.level.clone()
        } else {
            let level = &self.logging.level;
            format!(
                "fedauth_server={level},fedauth_axum={level},fedauth_identity_openid={level},fedauth_session={level},tower_http={level},warn"
            )
        }
    }
}
