// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message asset downloader
//!
//! Each asset URL is fetched conditionally into the `messages/{id}`
//! namespace of the content cache; afterwards every cached entry of that
//! namespace that is no longer referenced is deleted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheError, CacheResult, CacheStore};
use crate::config::MESSAGES_CACHE_NAMESPACE;
use crate::network::headers::{apply_conditional_headers, response_metadata, NOT_MODIFIED};
use crate::network::{NetworkRequest, Networking};

/// Cache namespace holding the assets of one message.
pub fn message_namespace(message_id: &str) -> String {
    format!("{MESSAGES_CACHE_NAMESPACE}/{message_id}")
}

/// Only absolute http(s) URLs are fetched.
pub fn is_downloadable_asset(asset: &str) -> bool {
    url::Url::parse(asset)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// What happened to each asset of one download pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetDownloadSummary {
    /// Fetched and written to the cache.
    pub downloaded: Vec<String>,
    /// Server reported the cached copy as current.
    pub not_modified: Vec<String>,
    /// Fetch failed; the asset is not cached.
    pub failed: Vec<String>,
    /// Not an http(s) URL.
    pub skipped: Vec<String>,
    /// Stale entries deleted by reconciliation.
    pub removed: Vec<String>,
}

/// Downloads and reconciles message assets.
#[derive(Clone)]
pub struct MessageAssetDownloader {
    network: Arc<dyn Networking>,
    cache: Arc<dyn CacheStore>,
    timeout: Duration,
    max_size: u64,
}

impl MessageAssetDownloader {
    pub fn new(
        network: Arc<dyn Networking>,
        cache: Arc<dyn CacheStore>,
        timeout: Duration,
        max_size: u64,
    ) -> Self {
        MessageAssetDownloader {
            network,
            cache,
            timeout,
            max_size,
        }
    }

    /// Cached copy of one asset.
    pub fn cached_asset(&self, message_id: &str, url: &str) -> Option<CacheResult> {
        self.cache
            .get(&message_namespace(message_id), url)
            .unwrap_or_else(|e| {
                warn!("Failed to read cached asset {url}: {e}");
                None
            })
    }

    /// Fetches every asset of `message_id`, then drops cached assets that are
    /// not in `asset_urls`.
    ///
    /// Individual download failures are recorded in the summary; only cache
    /// failures during reconciliation are errors.
    pub async fn download_asset_collection(
        &self,
        asset_urls: &[String],
        message_id: &str,
    ) -> Result<AssetDownloadSummary, CacheError> {
        let namespace = message_namespace(message_id);
        let mut summary = AssetDownloadSummary::default();
        let mut retained: Vec<&str> = Vec::new();

        for url in asset_urls {
            if !is_downloadable_asset(url) {
                debug!("Skipping asset ({url}), not an http(s) URL");
                summary.skipped.push(url.clone());
                continue;
            }
            retained.push(url.as_str());

            match self.download_asset(&namespace, url).await {
                Ok(true) => summary.downloaded.push(url.clone()),
                Ok(false) => summary.not_modified.push(url.clone()),
                Err(reason) => {
                    debug!("Failed to download asset from {url}: {reason}");
                    summary.failed.push(url.clone());
                }
            }
        }

        for key in self.cache.keys(&namespace)? {
            if !retained.contains(&key.as_str()) && self.cache.remove(&namespace, &key)? {
                trace!("Removed stale asset {key} of message {message_id}");
                summary.removed.push(key);
            }
        }

        Ok(summary)
    }

    /// Returns `Ok(true)` when new content was cached, `Ok(false)` on 304.
    async fn download_asset(&self, namespace: &str, url: &str) -> Result<bool, String> {
        let cached = self.cache.get(namespace, url).map_err(|e| e.to_string())?;

        let mut request = NetworkRequest::get(url, self.timeout);
        if let Some(cached) = &cached {
            request = apply_conditional_headers(request, &cached.metadata);
        }

        let response = self
            .network
            .connect(request)
            .await
            .map_err(|e| e.to_string())?;

        match response.status {
            200 => {
                if response.body.len() as u64 > self.max_size {
                    return Err(format!(
                        "asset of {} bytes exceeds {} bytes",
                        response.body.len(),
                        self.max_size
                    ));
                }
                let metadata = response_metadata(&response);
                self.cache
                    .set(namespace, url, CacheEntry::new(response.body, metadata))
                    .map_err(|e| e.to_string())?;
                trace!("{url} has been downloaded and cached");
                Ok(true)
            }
            NOT_MODIFIED if cached.is_some() => Ok(false),
            status => Err(format!("unexpected status {status}")),
        }
    }
}
