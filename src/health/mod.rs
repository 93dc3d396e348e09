//! Gateway liveness report.
//!
//! The report describes the gateway process only. Backend reachability is
//! never checked, so the answer does not depend on any service being up.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub message: &'static str,
}

/// The liveness report for a running gateway.
pub fn report() -> HealthReport {
    HealthReport {
        status: "OK",
        message: "API Gateway is running",
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
