//! Configuration module for the interview relay server
//!
//! Configuration comes from three sources: `.env` files, environment
//! variables and an optional YAML file. Priority: YAML > ENV vars > .env
//! values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation and derived values
//!
//! # Example
//! ```rust,no_run
//! use interview_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::derive_supabase_database_url;
pub use yaml::YamlConfig;

/// Default service name reported by the health endpoint
pub const DEFAULT_SERVICE_NAME: &str = "mba-interview-agent";

/// Default live model
pub const DEFAULT_MODEL: &str = "gemini-live-2.5-flash-preview-native-audio";

/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Kore";

/// Default live API version
pub const DEFAULT_API_VERSION: &str = "v1alpha";

/// Default application name reported to Postgres
pub const DEFAULT_APPLICATION_NAME: &str = "mba_interview_agent";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A secret string that is wiped from memory when dropped.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Upstream live session settings
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// API key for the live model endpoint (`GEMINI_API_KEY` / `GOOGLE_API_KEY`)
    pub api_key: Option<Secret>,
    pub model: String,
    pub voice: String,
    pub api_version: String,
    /// Full websocket URL override; the API key is still appended as `key`
    pub endpoint: Option<String>,
    pub connect_timeout_seconds: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            endpoint: None,
            connect_timeout_seconds: 15,
        }
    }
}

impl UpstreamSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Persistence store settings
///
/// When `url` is `None` the relay runs with the in-memory store.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<Secret>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub command_timeout_seconds: u64,
    /// Budget for the persona lookup done before the upstream connect
    pub persona_timeout_ms: u64,
    pub application_name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            min_connections: 1,
            max_connections: 10,
            command_timeout_seconds: 30,
            persona_timeout_ms: 2000,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn persona_timeout(&self) -> Duration {
        Duration::from_millis(self.persona_timeout_ms)
    }
}

/// Tool dispatch settings
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Upper bound for a single handler execution
    pub timeout_seconds: u64,
    /// Maximum number of in-flight tool tasks per session
    pub max_pending: usize,
    /// How long outstanding tool tasks may linger after a session ends
    pub drain_timeout_seconds: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_pending: 32,
            drain_timeout_seconds: 5,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    /// `None` keeps the default permissive policy, `Some("*")` is explicit
    pub cors_allowed_origins: Option<String>,
    pub upstream: UpstreamSettings,
    pub database: DatabaseSettings,
    pub tools: ToolSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            cors_allowed_origins: None,
            upstream: UpstreamSettings::default(),
            database: DatabaseSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the merged
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables as base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values (loaded in `main`)
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed,
    /// environment variables have invalid formats, or validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a persistence database is configured
    pub fn has_database(&self) -> bool {
        self.database.url.is_some()
    }
}
