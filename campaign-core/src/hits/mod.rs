// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hit Queue & Processor
//!
//! Registration and tracking requests are persisted as [`Hit`] records and
//! delivered by a single background worker in enqueue order.

mod processor;
mod queue;

pub use processor::{HitOutcome, HitProcessor};
pub use queue::HitQueue;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::NetworkRequest;

/// A queued outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Destination URL.
    pub url: String,
    /// JSON body; empty for GET requests.
    #[serde(default)]
    pub payload: String,
    /// Per-attempt timeout in seconds.
    pub timeout: u32,
    /// Enqueue time, epoch millis.
    pub timestamp: i64,
}

impl Hit {
    pub fn new(url: impl Into<String>, payload: impl Into<String>, timeout: u32) -> Self {
        Hit {
            url: url.into(),
            payload: payload.into(),
            timeout,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Registration hits are the only ones carrying a body.
    pub fn is_registration(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Builds the network request for one delivery attempt.
    pub fn to_request(&self) -> NetworkRequest {
        NetworkRequest::for_payload(
            &self.url,
            &self.payload,
            Duration::from_secs(u64::from(self.timeout)),
        )
        .with_header("Accept", "*/*")
        .with_header("Connection", "close")
    }
}
