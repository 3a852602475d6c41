use super::yaml::YamlConfig;
use super::{ConfigError, Secret, ServerConfig, env};

/// Build the final configuration: environment first, then YAML overrides.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(service_name) = server.service_name {
            config.service_name = service_name;
        }
    }

    if let Some(upstream) = yaml.upstream {
        if let Some(api_key) = upstream.api_key {
            config.upstream.api_key = Some(Secret::from(api_key));
        }
        if let Some(model) = upstream.model {
            config.upstream.model = model;
        }
        if let Some(voice) = upstream.voice {
            config.upstream.voice = voice;
        }
        if let Some(api_version) = upstream.api_version {
            config.upstream.api_version = api_version;
        }
        if upstream.endpoint.is_some() {
            config.upstream.endpoint = upstream.endpoint;
        }
        if let Some(timeout) = upstream.connect_timeout_seconds {
            config.upstream.connect_timeout_seconds = timeout;
        }
    }

    if let Some(database) = yaml.database {
        if let Some(url) = database.url {
            config.database.url = Some(Secret::from(url));
        }
        if let Some(min) = database.min_connections {
            config.database.min_connections = min;
        }
        if let Some(max) = database.max_connections {
            config.database.max_connections = max;
        }
        if let Some(timeout) = database.command_timeout_seconds {
            config.database.command_timeout_seconds = timeout;
        }
        if let Some(timeout) = database.persona_timeout_ms {
            config.database.persona_timeout_ms = timeout;
        }
        if let Some(name) = database.application_name {
            config.database.application_name = name;
        }
    }

    if let Some(tools) = yaml.tools {
        if let Some(timeout) = tools.timeout_seconds {
            config.tools.timeout_seconds = timeout;
        }
        if let Some(max_pending) = tools.max_pending {
            config.tools.max_pending = max_pending;
        }
        if let Some(drain) = tools.drain_timeout_seconds {
            config.tools.drain_timeout_seconds = drain;
        }
    }

    if let Some(security) = yaml.security
        && security.cors_allowed_origins.is_some()
    {
        config.cors_allowed_origins = security.cors_allowed_origins;
    }

    Ok(config)
}
