//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay backend status, headers and body to the client
//! - Strip hop-by-hop headers
//!
//! # Design Decisions
//! - Backend payloads, including 4xx/5xx, are never reinterpreted
//! - The body is buffered inside the backend deadline, up to a size cap;
//!   a stalled or oversized backend body counts as a failed exchange

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::security::headers::strip_hop_by_hop;

/// A backend response, owned by one forward operation.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// Collect a backend response whose body is at most `limit` bytes.
    pub async fn collect<B>(response: axum::http::Response<B>, limit: usize) -> Result<Self, axum::Error>
    where
        B: axum::body::HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        let (parts, body) = response.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > limit as u64) {
            return Err(axum::Error::new(format!("response body exceeds {} bytes", limit)));
        }

        let body = axum::body::to_bytes(Body::new(body), limit).await?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(Self {
            status: parts.status,
            headers,
            body,
        })
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
