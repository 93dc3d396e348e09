//! Gateway dispatcher: the per-request pipeline.
//!
//! ```text
//! Received ─▶ RateChecked ─▶ RouteMatched ─▶ (AuthChecked) ─▶ Forwarded ─▶ Responded
//!    │ 429         │ 404 / health    │ 401            │ 502
//!    └─────────────┴─────────────────┴────────────────┴──▶ short-circuit response
//! ```
//!
//! Stages run in this fixed order. Each failing stage ends the request with
//! its own response; later stages never run.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::{IntoResponse, Response};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health;
use crate::http::forward::Forwarder;
use crate::routing::{RouteError, RouteTable};
use crate::security::headers::client_key;
use crate::security::{AuthError, RateDecision, RateLimiter, TokenVerifier};

/// Owns every component a request passes through.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    verifier: Arc<TokenVerifier>,
    limiter: Option<Arc<RateLimiter>>,
    forwarder: Forwarder,
    health_path: Arc<str>,
    trust_forwarded_for: bool,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        verifier: Arc<TokenVerifier>,
        limiter: Option<Arc<RateLimiter>>,
        forwarder: Forwarder,
        health_path: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            routes,
            verifier,
            limiter,
            forwarder,
            health_path: health_path.into(),
            trust_forwarded_for: false,
        }
    }

    /// Build every component from configuration, using `limiter` as the shared limiter.
    pub fn from_config(config: &GatewayConfig, limiter: Option<Arc<RateLimiter>>) -> Result<Self, RouteError> {
        let routes = RouteTable::from_config(
            &config.routes,
            std::time::Duration::from_secs(config.timeouts.upstream_secs),
        )?;
        let forwarder = Forwarder::new(
            &config.timeouts,
            config.security.max_body_size,
            config.security.max_response_size,
        );

        let mut dispatcher = Self::new(
            Arc::new(routes),
            Arc::new(TokenVerifier::new(&config.auth.jwt_secret)),
            limiter,
            forwarder,
            config.health_path.as_str(),
        );
        dispatcher.trust_forwarded_for = config.rate_limit.trust_forwarded_for;
        Ok(dispatcher)
    }

    /// The compiled route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(&self, peer: Option<SocketAddr>, request: Request<Body>) -> Response {
        // Received → RateChecked
        let decision = self.limiter.as_ref().map(|limiter| {
            let key = client_key(request.headers(), peer, self.trust_forwarded_for);
            let decision = limiter.admit(&key);
            if !decision.is_allowed() {
                tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            }
            decision
        });

        let mut response = match decision {
            Some(RateDecision::Rejected(_)) => GatewayError::RateLimited.into_response(),
            _ => self
                .route_and_forward(peer, request)
                .await
                .unwrap_or_else(IntoResponse::into_response),
        };

        if let Some(decision) = decision {
            decision.apply_headers(response.headers_mut());
        }
        response
    }

    async fn route_and_forward(&self, peer: Option<SocketAddr>, mut request: Request<Body>) -> Result<Response, GatewayError> {
        if self.is_health_check(&request) {
            return Ok(health::report().into_response());
        }

        // RateChecked → RouteMatched
        let route = self.routes.match_path(request.uri().path()).ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "No route matched");
            GatewayError::RouteNotFound
        })?;

        // RouteMatched → AuthChecked
        if route.requires_auth {
            let claims = self
                .verifier
                .verify(authorization(&request)?)
                .inspect_err(|e| tracing::info!(route = %route.name, reason = ?e, "Authentication failed"))?;

            tracing::debug!(route = %route.name, subject = ?claims.subject(), "Token verified");
            request.extensions_mut().insert(claims);
        }

        // → Forwarded → Responded
        Ok(self.forwarder.forward(route, peer, request).await?)
    }

    fn is_health_check(&self, request: &Request<Body>) -> bool {
        request.uri().path() == &*self.health_path && matches!(*request.method(), Method::GET | Method::HEAD)
    }
}

/// The `Authorization` header, if any. Non-ASCII values count as malformed.
fn authorization(request: &Request<Body>) -> Result<Option<&str>, AuthError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedToken))
        .transpose()
}
