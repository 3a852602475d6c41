use std::env;
use std::str::FromStr;

use super::validation::derive_supabase_database_url;
use super::{ConfigError, DatabaseSettings, Secret, ServerConfig, ToolSettings, UpstreamSettings};

/// Read a non-empty environment variable.
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable, falling back to `default` when unset.
pub(super) fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Resolve the database URL.
///
/// `DATABASE_URL` wins; otherwise it is derived from the Supabase project URL
/// and database password when both are present.
fn database_url_from_env() -> Result<Option<Secret>, ConfigError> {
    if let Some(url) = var("DATABASE_URL") {
        return Ok(Some(Secret::from(url)));
    }

    match (var("NEXT_PUBLIC_SUPABASE_URL"), var("SUPABASE_DB_PASSWORD")) {
        (Some(supabase_url), Some(password)) => {
            derive_supabase_database_url(&supabase_url, &password).map(Some)
        }
        _ => Ok(None),
    }
}

/// Build the base configuration from environment variables and defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let defaults = ServerConfig::default();
    let upstream_defaults = UpstreamSettings::default();
    let database_defaults = DatabaseSettings::default();
    let tool_defaults = ToolSettings::default();

    let upstream = UpstreamSettings {
        api_key: var("GEMINI_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .map(Secret::from),
        model: var("GEMINI_MODEL").unwrap_or(upstream_defaults.model),
        voice: var("GEMINI_VOICE").unwrap_or(upstream_defaults.voice),
        api_version: var("GEMINI_API_VERSION").unwrap_or(upstream_defaults.api_version),
        endpoint: var("GEMINI_ENDPOINT"),
        connect_timeout_seconds: parse_var(
            "GEMINI_CONNECT_TIMEOUT_SECONDS",
            upstream_defaults.connect_timeout_seconds,
        )?,
    };

    let database = DatabaseSettings {
        url: database_url_from_env()?,
        min_connections: parse_var("DATABASE_MIN_CONNECTIONS", database_defaults.min_connections)?,
        max_connections: parse_var("DATABASE_MAX_CONNECTIONS", database_defaults.max_connections)?,
        command_timeout_seconds: parse_var(
            "DATABASE_COMMAND_TIMEOUT_SECONDS",
            database_defaults.command_timeout_seconds,
        )?,
        persona_timeout_ms: parse_var(
            "DATABASE_PERSONA_TIMEOUT_MS",
            database_defaults.persona_timeout_ms,
        )?,
        application_name: var("DATABASE_APPLICATION_NAME")
            .unwrap_or(database_defaults.application_name),
    };

    let tools = ToolSettings {
        timeout_seconds: parse_var("TOOL_TIMEOUT_SECONDS", tool_defaults.timeout_seconds)?,
        max_pending: parse_var("TOOL_MAX_PENDING", tool_defaults.max_pending)?,
        drain_timeout_seconds: parse_var(
            "TOOL_DRAIN_TIMEOUT_SECONDS",
            tool_defaults.drain_timeout_seconds,
        )?,
    };

    Ok(ServerConfig {
        host: var("HOST").unwrap_or(defaults.host),
        port: parse_var("PORT", defaults.port)?,
        service_name: var("SERVICE_NAME").unwrap_or(defaults.service_name),
        cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
        upstream,
        database,
        tools,
    })
}
