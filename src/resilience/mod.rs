//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (bound the whole backend exchange)
//!     → On expiry: the exchange is dropped and reported as unavailable
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A failed attempt is final: there is no retry and no circuit breaker

pub mod timeouts;

pub use timeouts::{with_timeout, TimedOut};
