use url::Url;

use super::{ConfigError, Secret, ServerConfig};

/// Derive a Postgres connection string from a Supabase project URL.
///
/// `https://<ref>.supabase.co` becomes
/// `postgresql://postgres:<password>@db.<ref>.supabase.co:5432/postgres`.
pub fn derive_supabase_database_url(
    supabase_url: &str,
    password: &str,
) -> Result<Secret, ConfigError> {
    let parsed = Url::parse(supabase_url).map_err(|e| ConfigError::InvalidValue {
        name: "NEXT_PUBLIC_SUPABASE_URL".to_string(),
        reason: e.to_string(),
    })?;

    let project_ref = parsed
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .ok_or_else(|| ConfigError::InvalidValue {
            name: "NEXT_PUBLIC_SUPABASE_URL".to_string(),
            reason: "URL has no host".to_string(),
        })?;

    let invalid = |reason: String| ConfigError::InvalidValue {
        name: "NEXT_PUBLIC_SUPABASE_URL".to_string(),
        reason,
    };
    let mut database_url = Url::parse(&format!(
        "postgresql://postgres@db.{project_ref}.supabase.co:5432/postgres"
    ))
    .map_err(|e| invalid(e.to_string()))?;
    // Percent-encodes reserved characters in the password
    database_url
        .set_password(Some(password))
        .map_err(|_| invalid("cannot carry a password".to_string()))?;

    Ok(Secret::from(String::from(database_url)))
}

/// Validate the merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.service_name.trim().is_empty() {
        return Err(ConfigError::Invalid("service name must not be empty".into()));
    }

    if config.database.max_connections == 0 {
        return Err(ConfigError::Invalid(
            "database.max_connections must be at least 1".into(),
        ));
    }

    if config.database.min_connections > config.database.max_connections {
        return Err(ConfigError::Invalid(format!(
            "database.min_connections ({}) exceeds database.max_connections ({})",
            config.database.min_connections, config.database.max_connections
        )));
    }

    if config.tools.max_pending == 0 {
        return Err(ConfigError::Invalid(
            "tools.max_pending must be at least 1".into(),
        ));
    }

    if config.tools.timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "tools.timeout_seconds must be at least 1".into(),
        ));
    }

    if let Some(endpoint) = &config.upstream.endpoint {
        let parsed = Url::parse(endpoint).map_err(|e| ConfigError::InvalidValue {
            name: "upstream.endpoint".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                name: "upstream.endpoint".to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
    }

    Ok(())
}
