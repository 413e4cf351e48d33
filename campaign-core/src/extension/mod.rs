// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Campaign Extension
//!
//! Wires host events to the state gate, the hit queue and the downloaders.
//! Errors never reach the host: every operation logs and absorbs failures.
//! Downloads run on the tokio runtime; operations that start one return its
//! `JoinHandle` so callers may await completion but never have to.

mod error;
mod events;

pub use error::{CampaignError, CampaignResult};
pub use events::{
    message_interaction, CallbackHandler, CampaignEvent, EventDispatcher, EventHandler,
    MESSAGE_CLICKED_KEY, MESSAGE_ID_KEY, MESSAGE_VIEWED_KEY,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::cache::{CacheResult, CacheStore, ContentCache, MemoryCache};
use crate::config::CampaignConfig;
use crate::hits::{Hit, HitProcessor, HitQueue};
use crate::messages::MessageAssetDownloader;
use crate::network::Networking;
use crate::requests::{
    encode_linkage_fields, registration_payload, registration_url, rules_url, tracking_url,
    PUSH_PLATFORM,
};
use crate::rules::{RuleConsequence, RulesDownloader, RulesEngine, RulesOutcome};
use crate::state::{
    should_send_registration, CampaignState, PrivacyStatus, RegistrationRecord, SharedState,
};
use crate::storage::{DataStore, HitStore, MemoryDataStore, MemoryHitStore, Storage};

/// Renders a triggered message.
pub trait MessagePresenter: Send + Sync {
    /// Shows `message`. `cached_assets` maps remote asset URLs to their
    /// cached copies; assets missing from the map are not cached.
    fn present(&self, message: &RuleConsequence, cached_assets: &BTreeMap<String, CacheResult>);
}

/// Collaborators of the extension.
#[derive(Clone)]
pub struct CampaignServices {
    pub network: Arc<dyn Networking>,
    pub datastore: Arc<dyn DataStore>,
    pub hit_store: Arc<dyn HitStore>,
    pub cache: Arc<dyn CacheStore>,
    pub rules_engine: Arc<dyn RulesEngine>,
    pub presenter: Arc<dyn MessagePresenter>,
}

impl CampaignServices {
    /// Durable services under `config.storage_path`.
    pub fn open(
        config: &CampaignConfig,
        network: Arc<dyn Networking>,
        rules_engine: Arc<dyn RulesEngine>,
        presenter: Arc<dyn MessagePresenter>,
    ) -> CampaignResult<Self> {
        let storage = Arc::new(Storage::open(config.database_path())?);
        let cache = Arc::new(ContentCache::new(&config.storage_path)?);
        Ok(CampaignServices {
            network,
            datastore: storage.clone(),
            hit_store: storage,
            cache,
            rules_engine,
            presenter,
        })
    }

    /// Volatile services.
    pub fn in_memory(
        network: Arc<dyn Networking>,
        rules_engine: Arc<dyn RulesEngine>,
        presenter: Arc<dyn MessagePresenter>,
    ) -> Self {
        CampaignServices {
            network,
            datastore: Arc::new(MemoryDataStore::new()),
            hit_store: Arc::new(MemoryHitStore::new()),
            cache: Arc::new(MemoryCache::new()),
            rules_engine,
            presenter,
        }
    }
}

#[derive(Debug, Default)]
struct RulesProgress {
    cached_rules_loaded: bool,
    download_pending: bool,
    linkage_token: Option<String>,
    /// Rules URL of the last download started this session; cleared when
    /// that download fails.
    requested_url: Option<String>,
}

/// The Campaign extension.
pub struct CampaignExtension {
    services: CampaignServices,
    state: RwLock<Arc<CampaignState>>,
    progress: Arc<Mutex<RulesProgress>>,
    hit_queue: HitQueue,
    rules: Arc<RulesDownloader>,
    assets: MessageAssetDownloader,
    events: Arc<RwLock<EventDispatcher>>,
}

impl CampaignExtension {
    /// Creates the extension. Must be called within a tokio runtime.
    pub fn new(config: &CampaignConfig, services: CampaignServices) -> Self {
        let assets = MessageAssetDownloader::new(
            services.network.clone(),
            services.cache.clone(),
            config.download_timeout,
            config.max_download_size,
        );
        let rules = Arc::new(RulesDownloader::new(
            services.network.clone(),
            services.cache.clone(),
            services.datastore.clone(),
            services.rules_engine.clone(),
            assets.clone(),
            config.download_timeout,
            config.max_download_size,
        ));
        let processor = HitProcessor::new(
            services.network.clone(),
            services.datastore.clone(),
            config.retry_interval,
        );
        let hit_queue = HitQueue::new(services.hit_store.clone(), processor);

        CampaignExtension {
            services,
            state: RwLock::new(Arc::new(CampaignState::default())),
            progress: Arc::new(Mutex::new(RulesProgress {
                download_pending: true,
                ..Default::default()
            })),
            hit_queue,
            rules,
            assets,
            events: Arc::new(RwLock::new(EventDispatcher::new())),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<CampaignState> {
        self.state.read().clone()
    }

    /// Durable queue carrying registration and tracking hits.
    pub fn hit_queue(&self) -> &HitQueue {
        &self.hit_queue
    }

    /// Registers a handler for outbound events.
    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.events.write().add_handler(handler);
    }

    /// Current personalization token.
    pub fn linkage_token(&self) -> Option<String> {
        self.progress.lock().linkage_token.clone()
    }

    fn set_state(&self, config: Option<&SharedState>, identity: Option<&SharedState>) -> Arc<CampaignState> {
        let state = Arc::new(CampaignState::from_shared_state(config, identity));
        *self.state.write() = state.clone();
        state
    }

    /// Handles a configuration change.
    ///
    /// Installs cached rules on the first call, applies the privacy status to
    /// the hit queue and downloads rules when the state allows it and the
    /// rules URL differs from the last one requested.
    pub fn process_configuration_response(
        &self,
        config: &SharedState,
        identity: Option<&SharedState>,
    ) -> Option<JoinHandle<()>> {
        if config.is_empty() {
            debug!("Ignoring empty configuration");
            return None;
        }
        let state = self.set_state(Some(config), identity);

        if let Err(e) = self.hit_queue.handle_privacy_change(state.privacy) {
            error!("Failed to apply privacy status to the hit queue: {e}");
        }
        if state.privacy == PrivacyStatus::OptOut {
            self.process_privacy_opt_out();
            return None;
        }

        let (load_cached, download) = {
            let mut progress = self.progress.lock();
            let load_cached = !progress.cached_rules_loaded;
            progress.cached_rules_loaded = true;

            let download = if state.can_download_rules() {
                progress.download_pending = false;
                let url = rules_url(&state);
                if progress.requested_url.as_deref() == Some(url.as_str()) {
                    trace!("Rules URL ({url}) is unchanged, skipping the download");
                    None
                } else {
                    progress.requested_url = Some(url.clone());
                    Some((url, progress.linkage_token.clone()))
                }
            } else {
                debug!("Campaign is not configured to download rules, deferring the download");
                progress.download_pending = true;
                None
            };
            (load_cached, download)
        };

        if !load_cached && download.is_none() {
            return None;
        }

        let rules = self.rules.clone();
        let events = self.events.clone();
        let progress = self.progress.clone();
        Some(tokio::spawn(async move {
            if load_cached {
                match rules.load_cached_rules().await {
                    Ok(Some(rule_count)) => {
                        events.read().dispatch(CampaignEvent::RulesInstalled { rule_count });
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Failed to load cached rules: {e}"),
                }
            }
            if let Some((url, token)) = download {
                download_rules(&rules, &events, &progress, &url, token.as_deref()).await;
            }
        }))
    }

    /// Handles an identity change; runs a deferred rules download if it is
    /// now possible.
    pub fn process_identity_update(
        &self,
        config: Option<&SharedState>,
        identity: &SharedState,
    ) -> Option<JoinHandle<()>> {
        let state = self.set_state(config, Some(identity));
        let token = {
            let mut progress = self.progress.lock();
            if !progress.download_pending || !state.can_download_rules() {
                return None;
            }
            progress.download_pending = false;
            progress.linkage_token.clone()
        };
        Some(self.spawn_rules_download(rules_url(&state), token))
    }

    /// Queues a registration hit if one is due at `timestamp_ms`.
    ///
    /// Returns true if a hit was queued.
    pub fn process_lifecycle_update(&self, timestamp_ms: i64) -> bool {
        let state = self.state();
        if !state.can_register() {
            debug!("Campaign is not configured to send a registration request");
            return false;
        }

        let record = match RegistrationRecord::load(self.services.datastore.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read the registration record: {e}");
                RegistrationRecord::default()
            }
        };
        if !should_send_registration(&state, &record, timestamp_ms) {
            return false;
        }

        let payload = registration_payload(PUSH_PLATFORM, &state.client_id);
        self.queue_hit(Hit::new(registration_url(&state), payload, state.timeout_secs))
    }

    /// Queues a tracking hit for a message interaction and dispatches the
    /// matching [`CampaignEvent::MessageInteraction`].
    pub fn process_message_information(
        &self,
        broadlog_id: &str,
        delivery_id: &str,
        action: &str,
    ) -> bool {
        let state = self.state();
        if !state.can_send_track_info() {
            debug!("Campaign is not configured to send message track requests");
            return false;
        }
        if broadlog_id.is_empty() || delivery_id.is_empty() || action.is_empty() {
            debug!("Cannot send message track request, broadlog id, delivery id or action is empty");
            return false;
        }

        match message_interaction(action, delivery_id) {
            Some(event) => self.events.read().dispatch(event),
            None => trace!("No interaction event for action {action} of delivery {delivery_id}"),
        }

        let url = tracking_url(&state, broadlog_id, delivery_id, action);
        self.queue_hit(Hit::new(url, "", state.timeout_secs))
    }

    /// Sets linkage fields and re-downloads personalized rules.
    pub fn set_linkage_fields(&self, fields: &BTreeMap<String, String>) -> Option<JoinHandle<()>> {
        let Some(token) = encode_linkage_fields(fields) else {
            debug!("Unable to set linkage fields, none were provided");
            return None;
        };
        self.progress.lock().linkage_token = Some(token.clone());

        let state = self.state();
        if !state.can_download_rules() {
            debug!("Campaign is not configured to download rules");
            return None;
        }
        self.clear_rules_cache();
        Some(self.spawn_rules_download(rules_url(&state), Some(token)))
    }

    /// Drops linkage fields, uninstalls rules and re-downloads generic rules.
    pub fn reset_linkage_fields(&self) -> Option<JoinHandle<()>> {
        self.progress.lock().linkage_token = None;
        self.rules.uninstall_rules();
        self.clear_rules_cache();
        self.trigger_rules_download()
    }

    /// Downloads rules for the current state, if permitted.
    pub fn trigger_rules_download(&self) -> Option<JoinHandle<()>> {
        let state = self.state();
        if !state.can_download_rules() {
            debug!("Campaign is not configured to download rules");
            return None;
        }
        let token = self.linkage_token();
        Some(self.spawn_rules_download(rules_url(&state), token))
    }

    /// Clears every piece of Campaign data after an opt-out.
    pub fn process_privacy_opt_out(&self) {
        trace!("Privacy opted out, clearing cached data");
        {
            let mut progress = self.progress.lock();
            progress.linkage_token = None;
            progress.requested_url = None;
        }
        self.rules.uninstall_rules();
        self.clear_rules_cache();
        if let Err(e) = self.services.datastore.remove_all() {
            error!("Failed to clear the Campaign data store: {e}");
        }
        if let Err(e) = self.hit_queue.handle_privacy_change(PrivacyStatus::OptOut) {
            error!("Failed to clear the hit queue: {e}");
        }
    }

    /// Evaluates a host event and presents the first triggered consequence.
    pub fn process_event(&self, event: &Value) -> Option<JoinHandle<()>> {
        let consequence = self
            .services
            .rules_engine
            .process(event)
            .into_iter()
            .next()?;
        Some(self.process_rule_consequence(consequence))
    }

    /// Caches the assets of a triggered message, then hands it to the presenter.
    pub fn process_rule_consequence(&self, consequence: RuleConsequence) -> JoinHandle<()> {
        let assets = self.assets.clone();
        let presenter = self.services.presenter.clone();

        tokio::spawn(async move {
            let urls = if consequence.is_fullscreen_message() {
                consequence.remote_assets()
            } else {
                Vec::new()
            };

            let missing = urls
                .iter()
                .any(|url| assets.cached_asset(&consequence.id, url).is_none());
            if missing {
                if let Err(e) = assets.download_asset_collection(&urls, &consequence.id).await {
                    warn!("Failed to cache assets of message {}: {e}", consequence.id);
                }
            }

            let cached: BTreeMap<String, CacheResult> = urls
                .iter()
                .filter_map(|url| {
                    assets
                        .cached_asset(&consequence.id, url)
                        .map(|hit| (url.clone(), hit))
                })
                .collect();
            presenter.present(&consequence, &cached);
        })
    }

    /// Stops hit delivery. Pending hits stay persisted.
    pub async fn close(&self) {
        self.hit_queue.close().await;
    }

    fn queue_hit(&self, hit: Hit) -> bool {
        match self.hit_queue.queue(&hit) {
            Ok(_) => {
                debug!(
                    "Campaign request queued with url ({}) and body ({})",
                    hit.url, hit.payload
                );
                true
            }
            Err(e) => {
                error!("Failed to queue Campaign request: {e}");
                false
            }
        }
    }

    fn clear_rules_cache(&self) {
        if let Err(e) = self.rules.clear_cached_rules() {
            warn!("Failed to clear the rules cache: {e}");
        }
    }

    fn spawn_rules_download(&self, url: String, token: Option<String>) -> JoinHandle<()> {
        self.progress.lock().requested_url = Some(url.clone());
        let rules = self.rules.clone();
        let events = self.events.clone();
        let progress = self.progress.clone();
        tokio::spawn(async move {
            download_rules(&rules, &events, &progress, &url, token.as_deref()).await;
        })
    }
}

async fn download_rules(
    rules: &RulesDownloader,
    events: &RwLock<EventDispatcher>,
    progress: &Mutex<RulesProgress>,
    url: &str,
    token: Option<&str>,
) {
    match rules.load_rules_from_url(url, token).await {
        Ok(RulesOutcome::Loaded { rules: rule_count }) => {
            debug!("Installed {rule_count} rule(s) from {url}");
            events
                .read()
                .dispatch(CampaignEvent::RulesInstalled { rule_count });
        }
        Ok(RulesOutcome::NotModified) => {}
        Err(e) => {
            warn!("Rules download from {url} failed: {e}");
            let mut progress = progress.lock();
            if progress.requested_url.as_deref() == Some(url) {
                progress.requested_url = None;
            }
        }
    }
}
