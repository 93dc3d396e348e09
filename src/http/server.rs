//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router around the dispatcher
//! - Wire up middleware (tracing, request ID, CORS, security headers, limits)
//! - Bind the server to a listener and run until shutdown
//! - Own the rate limit sweeper task
//!
//! # Design Decisions
//! - A single fallback handler: all routing decisions belong to the dispatcher
//! - The request deadline wraps the concurrency limit, so time spent
//!   waiting for a slot counts against it
//! - Panics and expired deadlines become the JSON error envelope
//! - Security headers never override a header the backend already set

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::dispatcher::Dispatcher;
use crate::resilience::with_timeout;
use crate::routing::RouteError;
use crate::security::headers::security_headers;
use crate::security::RateLimiter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, RouteError> {
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let dispatcher = Dispatcher::from_config(&config, limiter.clone())?;
        if dispatcher.routes().is_empty() {
            tracing::warn!("No routes configured; only the health check will answer");
        } else {
            tracing::debug!(routes = dispatcher.routes().len(), "Dispatcher ready");
        }

        let router = Self::build_router(&config, AppState { dispatcher });

        Ok(Self { router, config, limiter })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic));

        if config.security.cors_enabled {
            router = router
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(preflight_no_content));
        }

        router = router
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(middleware::from_fn_with_state(
                Duration::from_secs(config.timeouts.request_secs),
                request_deadline,
            ));

        if config.security.enable_headers {
            for (name, value) in security_headers() {
                router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
            }
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            rate_limit = self.limiter.is_some(),
            "HTTP server starting"
        );

        if let Some(limiter) = self.limiter.clone() {
            let interval = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
            tokio::spawn(limiter.run_sweeper(interval, shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request lands here; the dispatcher decides what happens to it.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    state.dispatcher.dispatch(peer, request).await
}

/// Hard ceiling on a whole request, including the wait for a concurrency slot.
async fn request_deadline(State(limit): State<Duration>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match with_timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(timed_out) => {
            tracing::warn!(method = %method, path = %path, error = %timed_out, "Request deadline exceeded");
            GatewayError::RequestTimeout.into_response()
        }
    }
}

/// Answer CORS preflight with 204 No Content.
async fn preflight_no_content(request: Request<Body>, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS
        && request.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let mut response = next.run(request).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    GatewayError::Internal(format!("handler panicked: {}", detail)).into_response()
}
