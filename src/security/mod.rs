//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client fixed window)
//!     → token.rs (bearer verification, on routes that require it)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Token secret and limiter state are owned, injected components

pub mod headers;
pub mod rate_limit;
pub mod token;

pub use rate_limit::{RateDecision, RateLimitInfo, RateLimiter};
pub use token::{AuthError, Claims, TokenVerifier};
