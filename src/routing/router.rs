//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use std::time::Duration;

use axum::http::uri::{Authority, InvalidUri, Scheme};
use axum::http::Uri;
use thiserror::Error;

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// Error compiling the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{route}': invalid backend URL: {source}")]
    InvalidBackend {
        route: String,
        #[source]
        source: InvalidUri,
    },

    #[error("route '{0}': backend URL has no host")]
    MissingAuthority(String),
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route identifier.
    pub name: String,
    /// Whether a verified token is required before forwarding.
    pub requires_auth: bool,
    /// Bound on the backend exchange.
    pub timeout: Duration,
    matcher: PathPrefixMatcher,
    rewrite_to: String,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl Route {
    /// Compile a route from its configuration.
    pub fn from_config(config: &RouteConfig, default_timeout: Duration) -> Result<Self, RouteError> {
        let backend: Uri = config.backend_url.parse().map_err(|source| RouteError::InvalidBackend {
            route: config.name.clone(),
            source,
        })?;

        let authority = backend
            .authority()
            .cloned()
            .ok_or_else(|| RouteError::MissingAuthority(config.name.clone()))?;

        Ok(Self {
            name: config.name.clone(),
            requires_auth: config.requires_auth,
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default_timeout),
            matcher: PathPrefixMatcher::new(config.path_prefix.as_str()),
            rewrite_to: config.rewrite_to.clone(),
            scheme: backend.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            base_path: backend.path().trim_end_matches('/').to_string(),
        })
    }

    /// Returns true if the path lies under this route's prefix.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches_path(path)
    }

    /// Apply the prefix rewrite to an inbound path and query.
    pub fn rewrite(&self, path_and_query: &str) -> Option<String> {
        self.matcher.rewrite(path_and_query, &self.rewrite_to)
    }

    /// Full backend URI for an inbound path and query.
    pub fn target_uri(&self, path_and_query: &str) -> Option<Uri> {
        let rewritten = self.rewrite(path_and_query)?;
        let target = format!("{}://{}{}{}", self.scheme, self.authority, self.base_path, rewritten);
        target.parse().ok()
    }

    /// Backend authority (`host:port`), used as the outbound `Host`.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Human-facing service name, e.g. `books` → `Books`.
    pub fn service_label(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Ordered, immutable route table. First match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes in configuration order.
    pub fn from_config(routes: &[RouteConfig], default_timeout: Duration) -> Result<Self, RouteError> {
        let routes = routes
            .iter()
            .map(|r| Route::from_config(r, default_timeout))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = routes.len(), "Route table compiled");
        Ok(Self { routes })
    }

    /// Find the first route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no routes are configured.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
