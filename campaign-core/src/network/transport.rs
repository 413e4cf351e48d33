//! Transport Trait
//!
//! Platform-agnostic abstraction for HTTP requests.

use std::time::Duration;

use async_trait::async_trait;

use super::error::NetworkError;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub url: String,
    pub method: HttpMethod,
    /// Request body; `None` for GET.
    pub body: Option<Vec<u8>>,
    /// Request headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Per-attempt timeout enforced by the transport.
    pub timeout: Duration,
}

impl NetworkRequest {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        NetworkRequest {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            headers: Vec::new(),
            timeout,
        }
    }

    /// Creates a request for a hit payload.
    ///
    /// A non-empty payload is sent as a JSON `POST`, an empty one as `GET`.
    pub fn for_payload(url: impl Into<String>, payload: &str, timeout: Duration) -> Self {
        let request = NetworkRequest::get(url, timeout);
        if payload.is_empty() {
            return request;
        }
        NetworkRequest {
            method: HttpMethod::Post,
            body: Some(payload.as_bytes().to_vec()),
            ..request
        }
        .with_header("Content-Type", "application/json")
    }

    /// Adds a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a request header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        HttpResponse {
            status,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks up a response header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Asynchronous HTTP transport.
///
/// Implementations enforce `request.timeout` per call and report a timeout
/// as [`NetworkError::Timeout`].
#[async_trait]
pub trait Networking: Send + Sync {
    /// Sends a request and waits for the response.
    async fn connect(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError>;
}
