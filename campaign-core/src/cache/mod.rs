// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Content Cache Module
//!
//! Maps `(namespace, key)` to a payload plus the freshness token needed for a
//! conditional re-fetch. Namespaces are `/`-separated paths such as
//! `campaign/campaignRules` or `campaign/messages/{messageId}`.
//!
//! Writes are atomic: a reader sees either the previous entry or the complete
//! new one, never a partial file.

mod file;
mod key;
mod memory;

pub use file::ContentCache;
pub use key::cache_key;
pub use memory::MemoryCache;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Freshness information stored alongside a cached payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// `ETag` of the cached response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `Last-Modified` of the cached response, epoch millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    /// Epoch millis after which the entry is treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl CacheMetadata {
    /// True when the entry carries an expiry that lies before `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now_ms)
    }
}

/// Payload to be written into the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn new(data: impl Into<Vec<u8>>, metadata: CacheMetadata) -> Self {
        Self {
            data: data.into(),
            metadata,
        }
    }
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult {
    /// Logical key the entry was stored under.
    pub key: String,
    pub data: Vec<u8>,
    pub metadata: CacheMetadata,
    /// Physical location of the payload, for file-backed caches.
    pub path: Option<PathBuf>,
}

/// Namespaced key/value content store.
///
/// Implementations allow concurrent readers and serialize writers.
pub trait CacheStore: Send + Sync {
    /// Looks up an entry. Expired entries are reported as a miss.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheResult>, CacheError>;

    /// Writes or overwrites an entry.
    fn set(&self, namespace: &str, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes one entry. Returns false if it was not cached.
    fn remove(&self, namespace: &str, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry in `namespace` and in all namespaces below it.
    fn remove_namespace(&self, namespace: &str) -> Result<(), CacheError>;

    /// Logical keys of the entries directly in `namespace`.
    fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError>;

    /// Names of the namespaces one level below `parent`.
    fn child_namespaces(&self, parent: &str) -> Result<Vec<String>, CacheError>;
}

/// Splits a namespace into validated path segments.
pub(crate) fn namespace_segments(namespace: &str) -> Result<Vec<&str>, CacheError> {
    let segments: Vec<&str> = namespace.split('/').collect();
    let valid = !namespace.is_empty()
        && segments.iter().all(|s| {
            !s.is_empty() && *s != "." && *s != ".." && !s.contains('\\') && !s.contains('\0')
        });
    if valid {
        Ok(segments)
    } else {
        Err(CacheError::InvalidNamespace(namespace.to_string()))
    }
}

/// Errors that can occur with the content cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Metadata serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Namespace is empty or would escape the cache root
    #[error("Invalid cache namespace: {0:?}")]
    InvalidNamespace(String),
}
