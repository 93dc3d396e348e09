//! Gateway-originated errors and their HTTP responses.
//!
//! Every error the gateway produces itself is rendered as
//! `{"status": "error", "message": ...}`. Backend responses never pass
//! through here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::security::AuthError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Too many requests, please try again later.")]
    RateLimited,

    #[error("Route not found")]
    RouteNotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{service} Service Unavailable")]
    BackendUnavailable { service: String },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Request timed out")]
    RequestTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body for gateway-originated errors.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            error: None,
        }
    }
}

/// Message shown for faults whose details must stay internal.
pub const INTERNAL_MESSAGE: &str = "Something went wrong!";

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InvalidBody => StatusCode::BAD_REQUEST,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            GatewayError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal gateway error");
                ErrorBody::new(INTERNAL_MESSAGE)
            }
            // Unavailable backends also carry the message under `error`.
            GatewayError::BackendUnavailable { .. } => ErrorBody {
                error: Some(self.to_string()),
                ..ErrorBody::new(self.to_string())
            },
            other => ErrorBody::new(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
