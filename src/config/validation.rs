//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend URLs and value ranges (timeouts > 0, port set)
//! - Detect routes shadowed by an earlier, broader prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("auth.jwt_secret must be set (JWT_SECRET)")]
    MissingSecret,

    #[error("listener.port must be non-zero")]
    InvalidPort,

    #[error("listener.max_concurrent_requests must be non-zero")]
    InvalidConcurrency,

    #[error("route '{0}' is defined more than once")]
    DuplicateRoute(String),

    #[error("route '{route}': path_prefix '{prefix}' must start with '/'")]
    InvalidPrefix { route: String, prefix: String },

    #[error("route '{route}': backend_url '{url}' is invalid: {reason}")]
    InvalidBackendUrl { route: String, url: String, reason: String },

    #[error("route '{route}' is unreachable: shadowed by earlier route '{by}'")]
    ShadowedRoute { route: String, by: String },

    #[error("{0} must be non-zero")]
    ZeroValue(&'static str),

    #[error("timeouts.request_secs ({request}s) must exceed the timeout of route '{route}' ({upstream}s)")]
    RequestTimeoutTooShort { route: String, request: u64, upstream: u64 },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.jwt_secret.trim().is_empty() {
        errors.push(ValidationError::MissingSecret);
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::InvalidConcurrency);
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::ZeroValue("rate_limit.window_secs"));
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::ZeroValue("rate_limit.max_requests"));
        }
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::ZeroValue("rate_limit.sweep_interval_secs"));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.upstream_secs"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroValue("security.max_body_size"));
    }
    if config.security.max_response_size == 0 {
        errors.push(ValidationError::ZeroValue("security.max_response_size"));
    }

    validate_routes(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();

    for (i, route) in config.routes.iter().enumerate() {
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }

        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                route: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        }

        if let Err(reason) = check_backend_url(&route.backend_url) {
            errors.push(ValidationError::InvalidBackendUrl {
                route: route.name.clone(),
                url: route.backend_url.clone(),
                reason,
            });
        }

        let upstream = route.timeout_secs.unwrap_or(config.timeouts.upstream_secs);
        if route.timeout_secs == Some(0) {
            errors.push(ValidationError::ZeroValue("routes.timeout_secs"));
        } else if config.timeouts.request_secs <= upstream {
            errors.push(ValidationError::RequestTimeoutTooShort {
                route: route.name.clone(),
                request: config.timeouts.request_secs,
                upstream,
            });
        }

        // An earlier prefix that matches this one catches all of its traffic.
        if let Some(earlier) = config.routes[..i]
            .iter()
            .find(|earlier| PathPrefixMatcher::new(earlier.path_prefix.as_str()).matches_path(&route.path_prefix))
        {
            errors.push(ValidationError::ShadowedRoute {
                route: route.name.clone(),
                by: earlier.name.clone(),
            });
        }
    }
}

fn check_backend_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query and fragment are not allowed".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = "secret".to_string();
        config
    }

    fn route(name: &str, prefix: &str) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            path_prefix: prefix.to_string(),
            backend_url: "http://127.0.0.1:9000".to_string(),
            rewrite_to: String::new(),
            requires_auth: false,
            timeout_secs: None,
        }
    }

    #[test]
    fn defaults_with_secret_are_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let errors = validate_config(&GatewayConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingSecret]);
    }

    #[test]
    fn collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.port = 0;
        config.routes = vec![route("a", "no-slash")];
        config.routes[0].backend_url = "https://secure.example".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingSecret));
        assert!(errors.contains(&ValidationError::InvalidPort));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidPrefix { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidBackendUrl { .. })));
    }

    #[test]
    fn shadowed_route_is_rejected() {
        let mut config = valid();
        config.routes = vec![route("api", "/api"), route("books", "/api/books")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ShadowedRoute { route: "books".into(), by: "api".into() }]
        );
    }

    #[test]
    fn sibling_prefixes_do_not_shadow() {
        let mut config = valid();
        config.routes = vec![route("book", "/api/book"), route("books", "/api/books")];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut config = valid();
        config.routes = vec![route("a", "/x"), route("a", "/y")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateRoute("a".into())]);
    }

    #[test]
    fn request_timeout_must_exceed_route_timeout() {
        let mut config = valid();
        config.routes[0].timeout_secs = Some(60);

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::RequestTimeoutTooShort { upstream: 60, .. }]
        ));
    }
}
