//! Campaign Core Library
//!
//! State-gated hit delivery and content caching for the Campaign extension.
//! Registration and tracking requests are queued durably and delivered by a
//! single background worker; rule bundles and message assets are fetched
//! conditionally and cached on disk.

pub mod cache;
pub mod config;
pub mod extension;
pub mod hits;
pub mod messages;
pub mod network;
pub mod requests;
pub mod rules;
pub mod state;
pub mod storage;

pub use cache::{
    CacheEntry, CacheError, CacheMetadata, CacheResult, CacheStore, ContentCache, MemoryCache,
};
pub use config::CampaignConfig;
pub use extension::{
    CallbackHandler, CampaignError, CampaignEvent, CampaignExtension, CampaignResult,
    CampaignServices, EventDispatcher, EventHandler, MessagePresenter,
};
pub use hits::{Hit, HitOutcome, HitProcessor, HitQueue};
pub use messages::{AssetDownloadSummary, MessageAssetDownloader};
pub use network::{HttpMethod, HttpResponse, MockNetwork, NetworkError, NetworkRequest, Networking};
#[cfg(feature = "http")]
pub use network::HttpClient;
pub use rules::{RuleConsequence, RuleSet, RulesDownloader, RulesEngine, RulesError, RulesOutcome};
pub use state::{CampaignState, PrivacyStatus, RegistrationRecord};
pub use storage::{DataStore, HitStore, MemoryDataStore, MemoryHitStore, Storage, StorageError};
