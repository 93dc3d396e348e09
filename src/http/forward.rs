//! Forwarding engine.
//!
//! # Responsibilities
//! - Turn an inbound request into a backend request for a matched route
//! - Send it with a bounded timeout
//! - Relay the backend response, or report the backend as unavailable
//!
//! # Design Decisions
//! - One attempt only; failure is reported, never retried
//! - Connect refusal, timeouts, broken or oversized bodies all map to `BackendUnavailable`
//! - The forward future is owned by the connection task: a client that
//!   disconnects drops it, which cancels the backend request

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::http::request::{read_body, ProxyRequest};
use crate::http::response::ProxyResponse;
use crate::resilience::with_timeout;
use crate::routing::Route;

/// Why a forward operation did not produce a backend response.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{service} backend unavailable: {reason}")]
    BackendUnavailable { service: String, reason: String },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("cannot build backend request: {0}")]
    Request(String),
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::BackendUnavailable { service, .. } => GatewayError::BackendUnavailable { service },
            ForwardError::PayloadTooLarge { .. } => GatewayError::PayloadTooLarge,
            ForwardError::InvalidJson(_) => GatewayError::InvalidBody,
            ForwardError::Request(detail) => GatewayError::Internal(detail),
        }
    }
}

/// Sends requests to backends over a pooled HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    max_body_size: usize,
    max_response_size: usize,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig, max_body_size: usize, max_response_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            max_body_size,
            max_response_size,
        }
    }

    /// Forward `request` to the backend of `route`.
    pub async fn forward(
        &self,
        route: &Route,
        client_addr: Option<SocketAddr>,
        request: Request<Body>,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let body = read_body(body, &parts.headers, self.max_body_size).await?;

        let outbound = ProxyRequest::build(route, client_addr, parts, body)?;
        let method = outbound.method.clone();
        let target = outbound.uri.clone();
        let request = outbound.into_http()?;

        let start = Instant::now();
        let outcome = with_timeout(route.timeout, self.exchange(request)).await;

        let reason = match outcome {
            Ok(Ok(response)) => {
                tracing::debug!(
                    route = %route.name,
                    method = %method,
                    target = %target,
                    status = %response.status,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Backend responded"
                );
                return Ok(response.into_response());
            }
            Ok(Err(reason)) => reason,
            Err(timed_out) => timed_out.to_string(),
        };

        tracing::error!(
            route = %route.name,
            method = %method,
            target = %target,
            error = %reason,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Backend request failed"
        );

        Err(ForwardError::BackendUnavailable {
            service: route.service_label(),
            reason,
        })
    }

    /// Send the request and collect the full response.
    async fn exchange(&self, request: Request<Body>) -> Result<ProxyResponse, String> {
        let response = self.client.request(request).await.map_err(|e| error_chain(&e))?;
        ProxyResponse::collect(response, self.max_response_size)
            .await
            .map_err(|e| error_chain(&e))
    }
}

/// Render an error with its sources, e.g. `client error (Connect): Connection refused`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
