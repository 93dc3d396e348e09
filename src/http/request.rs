//! Outbound request construction.
//!
//! # Responsibilities
//! - Buffer the inbound body within the size limit
//! - Validate JSON bodies before they reach a backend
//! - Rewrite the target URI and transform headers for the backend
//!
//! # Design Decisions
//! - Body bytes are re-emitted verbatim; Content-Length is always explicit
//! - Host is set to the backend authority
//! - Original request preserved for logging; modified copy forwarded

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Method, Request, Uri, Version};
use serde::de::IgnoredAny;

use crate::http::forward::ForwardError;
use crate::routing::Route;
use crate::security::headers::{add_forwarded_headers, strip_hop_by_hop};

/// A fully prepared backend request, owned by one forward operation.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Build the backend request for `route` from an inbound request.
    pub fn build(route: &Route, client: Option<SocketAddr>, parts: Parts, body: Bytes) -> Result<Self, ForwardError> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());

        let uri = route
            .target_uri(path_and_query)
            .ok_or_else(|| ForwardError::Request(format!("cannot rewrite '{}' for route '{}'", path_and_query, route.name)))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        add_forwarded_headers(&mut headers, client);

        let host = HeaderValue::from_str(route.authority().as_str())
            .map_err(|e| ForwardError::Request(e.to_string()))?;
        headers.insert(header::HOST, host);

        if is_json(&headers) && !body.is_empty() {
            serde_json::from_slice::<IgnoredAny>(&body).map_err(ForwardError::InvalidJson)?;
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        headers.remove(header::CONTENT_LENGTH);
        if !body.is_empty() || expects_body(&parts.method) {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        Ok(Self {
            method: parts.method,
            uri,
            headers,
            body,
        })
    }

    /// Convert into a request for the HTTP client.
    pub fn into_http(self) -> Result<Request<Body>, ForwardError> {
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.uri)
            .version(Version::HTTP_11)
            .body(Body::from(self.body))
            .map_err(|e| ForwardError::Request(e.to_string()))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// True when the `Content-Type` is JSON (`application/json`, `application/*+json`).
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

fn expects_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Buffer the inbound body, refusing anything over `limit` bytes.
pub async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, ForwardError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ForwardError::PayloadTooLarge { limit });
    }

    axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ForwardError::PayloadTooLarge { limit })
}
