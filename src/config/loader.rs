//! Configuration loading from disk, CLI flags and the environment.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment/flags.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Command-line interface. Every flag can also come from the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "api-gateway", version, about = "HTTP API gateway for the auth and books services")]
pub struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listening port.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Token verification secret.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Log output format (pretty or json).
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidEnv { key: String, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration from CLI flags and the process environment.
pub fn load(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    load_with_env(cli, |key| std::env::var(key).ok())
}

/// Same as [`load`] with an injectable environment lookup.
pub fn load_with_env<F>(cli: &Cli, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config {
        Some(path) => read_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(secret) = &cli.jwt_secret {
        config.auth.jwt_secret = secret.clone();
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    apply_route_overrides(&mut config, &env)?;

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply `<NAME>_SERVICE_URL` and `<NAME>_REQUIRE_AUTH` for every route.
fn apply_route_overrides<F>(config: &mut GatewayConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for route in &mut config.routes {
        let stem = route.name.to_ascii_uppercase().replace('-', "_");

        let url_key = format!("{}_SERVICE_URL", stem);
        if let Some(url) = env(&url_key) {
            tracing::debug!(route = %route.name, key = %url_key, "Backend URL overridden from environment");
            route.backend_url = url;
        }

        let auth_key = format!("{}_REQUIRE_AUTH", stem);
        if let Some(value) = env(&auth_key) {
            route.requires_auth = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                key: auth_key,
                value,
            })?;
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
