//! API Gateway
//!
//! A single entry point in front of independent backend services, built
//! with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                       API GATEWAY                         │
//!                              │                                                           │
//!     Client Request           │  ┌─────────┐    ┌────────────┐    ┌──────────────┐        │
//!     ─────────────────────────┼─▶│  http   │───▶│ rate limit │───▶│   routing    │        │
//!                              │  │ server  │    │ (per IP)   │    │ prefix table │        │
//!                              │  └─────────┘    └────────────┘    └──────┬───────┘        │
//!                              │                                         │                 │
//!                              │                                         ▼                 │
//!                              │                                  ┌──────────────┐         │
//!                              │                                  │ token verify │         │
//!                              │                                  │ (per route)  │         │
//!                              │                                  └──────┬───────┘         │
//!                              │                                         │                 │
//!                              │                                         ▼                 │
//!     Client Response          │  ┌─────────┐    ┌────────────┐    ┌──────────────┐        │
//!     ◀────────────────────────┼──│response │◀───│  forward   │◀───│   backend    │◀───────┼──── Backend
//!                              │  │ relay   │    │ (timeout)  │    │   request    │        │     Service
//!                              │  └─────────┘    └────────────┘    └──────────────┘        │
//!                              │                                                           │
//!                              │  ┌─────────────────────────────────────────────────────┐ │
//!                              │  │               Cross-Cutting Concerns                 │ │
//!                              │  │  ┌─────────┐ ┌────────┐ ┌──────────┐ ┌────────────┐ │ │
//!                              │  │  │ config  │ │ health │ │observa-  │ │ lifecycle  │ │ │
//!                              │  │  │         │ │ report │ │ bility   │ │ + shutdown │ │ │
//!                              │  │  └─────────┘ └────────┘ └──────────┘ └────────────┘ │ │
//!                              │  └─────────────────────────────────────────────────────┘ │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use api_gateway::lifecycle::startup;

#[tokio::main]
async fn main() -> ExitCode {
    match startup::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet when configuration fails.
            tracing::error!(error = %e, "Gateway failed");
            eprintln!("api-gateway: {}", e);
            ExitCode::FAILURE
        }
    }
}
