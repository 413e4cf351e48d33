// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Module
//!
//! Transport abstraction for hits, rules bundles and message assets.
//! `connect` resolves to a response for any HTTP status; only failures to
//! reach the server at all are errors.

mod error;
pub mod headers;
#[cfg(feature = "http")]
mod http;
mod mock;
mod transport;

pub use error::NetworkError;
#[cfg(feature = "http")]
pub use http::HttpClient;
pub use mock::MockNetwork;
pub use transport::{HttpMethod, HttpResponse, NetworkRequest, Networking};
