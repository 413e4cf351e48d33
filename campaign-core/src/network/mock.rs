//! Mock Transport
//!
//! Scripted [`Networking`] implementation for tests. Responses are queued
//! per URL; the last scripted outcome for a URL repeats once the queue is
//! down to one item. Unscripted URLs fail with a connection error.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::NetworkError;
use super::transport::{HttpResponse, NetworkRequest, Networking};

type Outcome = Result<HttpResponse, NetworkError>;

/// Mock transport for testing.
#[derive(Debug, Default)]
pub struct MockNetwork {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    requests: Mutex<Vec<NetworkRequest>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.push(url, Ok(response));
    }

    /// Queues a transport failure for `url`.
    pub fn fail(&self, url: &str, error: NetworkError) {
        self.push(url, Err(error));
    }

    /// Drops every scripted outcome for `url`.
    pub fn clear(&self, url: &str) {
        self.scripts.lock().remove(url);
    }

    fn push(&self, url: &str, outcome: Outcome) {
        self.scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<NetworkRequest> {
        self.requests.lock().clone()
    }

    /// Requests received for one URL.
    pub fn requests_to(&self, url: &str) -> Vec<NetworkRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Networking for MockNetwork {
    async fn connect(&self, request: NetworkRequest) -> Result<HttpResponse, NetworkError> {
        let url = request.url.clone();
        self.requests.lock().push(request);

        let mut scripts = self.scripts.lock();
        match scripts.get_mut(&url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(NetworkError::ConnectionFailed(url))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(NetworkError::ConnectionFailed(url))),
            None => Err(NetworkError::ConnectionFailed(format!("no route to {url}"))),
        }
    }
}
