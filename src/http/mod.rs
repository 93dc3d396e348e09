//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → dispatcher.rs (rate check, route match, auth)
//!     → request.rs (buffer body, rewrite path, transform headers)
//!     → forward.rs (send to backend with a deadline)
//!     → response.rs (relay status, headers, body)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use forward::{ForwardError, Forwarder};
pub use server::HttpServer;
