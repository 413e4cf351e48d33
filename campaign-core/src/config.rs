// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration for the Campaign extension core

use std::path::PathBuf;
use std::time::Duration;

/// Delay between delivery attempts of a hit that failed with a retryable outcome.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Request timeout (seconds) used until configuration provides `campaign.timeout`.
pub const DEFAULT_TIMEOUT_SECS: u32 = 5;

/// Registration delay (days) used until configuration provides one.
pub const DEFAULT_REGISTRATION_DELAY_DAYS: u32 = 7;

/// Cache namespace holding the extracted rules bundle.
pub const RULES_CACHE_NAMESPACE: &str = "campaign/campaignRules";

/// Parent cache namespace for per-message asset namespaces.
pub const MESSAGES_CACHE_NAMESPACE: &str = "campaign/messages";

/// Well-known rules definition member of the rules archive.
pub const RULES_JSON_FILE_NAME: &str = "rules.json";

/// Request header carrying the personalization token.
pub const LINKAGE_FIELD_HEADER: &str = "X-InApp-Auth";

/// Shared state keys read from the configuration extension.
pub mod config_keys {
    pub const PRIVACY: &str = "global.privacy";
    pub const PROPERTY_ID: &str = "property.id";
    pub const SERVER: &str = "campaign.server";
    pub const PKEY: &str = "campaign.pkey";
    pub const MCIAS: &str = "campaign.mcias";
    pub const TIMEOUT: &str = "campaign.timeout";
    pub const REGISTRATION_DELAY: &str = "campaign.registrationDelay";
    pub const REGISTRATION_PAUSED: &str = "campaign.registrationPaused";
}

/// Shared state keys read from the identity extension.
pub mod identity_keys {
    pub const CLIENT_ID: &str = "mid";
}

/// Keys of the durable data store collection.
pub mod datastore_keys {
    pub const REMOTE_URL: &str = "CampaignRemoteUrl";
    pub const CLIENT_ID: &str = "ExperienceCloudId";
    pub const REGISTRATION_TIMESTAMP: &str = "CampaignRegistrationTimestamp";
}

/// Configuration for the Campaign core
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Local storage path for the database and cache
    pub storage_path: PathBuf,

    /// Wait between retries of a retryable hit
    pub retry_interval: Duration,

    /// Timeout for rules and asset downloads
    pub download_timeout: Duration,

    /// Maximum accepted download size (bytes)
    pub max_download_size: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("."),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            download_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
            max_download_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl CampaignConfig {
    /// Configure with a storage path
    pub fn with_storage_path(mut self, storage_path: impl Into<PathBuf>) -> Self {
        self.storage_path = storage_path.into();
        self
    }

    /// Configure the retry interval of the hit queue
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Configure the maximum download size
    pub fn with_max_download_size(mut self, max: u64) -> Self {
        self.max_download_size = max;
        self
    }

    /// Path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.storage_path.join("campaign.db")
    }
}
