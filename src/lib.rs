//! API gateway library: a single entry point in front of independent
//! backend services.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::{Dispatcher, HttpServer};
pub use lifecycle::Shutdown;
