// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP transport backed by `reqwest`
//!
//! - Per-request timeout
//! - Size limits
//! - Case-insensitive response headers

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::error::NetworkError;
use super::transport::{HttpMethod, HttpResponse, NetworkRequest, Networking};
use crate::config::CampaignConfig;

/// Sends requests over HTTPS.
pub struct HttpClient {
    client: Client,
    max_response_size: u64,
}

impl HttpClient {
    /// Create a new client from config
    pub fn new(config: &CampaignConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(format!(
                "CampaignCore/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ))
            .build()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            max_response_size: config.max_download_size,
        })
    }
}

fn map_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_builder() {
        NetworkError::InvalidUrl(error.to_string())
    } else {
        NetworkError::ConnectionFailed(error.to_string())
    }
}

#[async_trait]
impl Networking for HttpClient {
    async fn connect(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        }
        .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        trace!("{} answered {status}", request.url);

        // Check content length before downloading
        if let Some(len) = response.content_length() {
            if len > self.max_response_size {
                return Err(NetworkError::TooLarge {
                    status,
                    size: len,
                    max: self.max_response_size,
                });
            }
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_error)?.to_vec();

        // Verify size after download (in case content-length was missing)
        if body.len() as u64 > self.max_response_size {
            return Err(NetworkError::TooLarge {
                status,
                size: body.len() as u64,
                max: self.max_response_size,
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
