// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Rules downloader
//!
//! A download either installs a complete new rule set or leaves the active
//! one untouched. The rules URL is persisted only after a successful
//! installation, so a failed attempt is retried from scratch next time.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use super::archive::{extract_members, ArchiveMember};
use super::{RuleSet, RulesEngine, RulesError};
use crate::cache::{CacheEntry, CacheMetadata, CacheStore};
use crate::config::{
    datastore_keys, LINKAGE_FIELD_HEADER, MESSAGES_CACHE_NAMESPACE, RULES_CACHE_NAMESPACE,
    RULES_JSON_FILE_NAME,
};
use crate::messages::{message_namespace, MessageAssetDownloader};
use crate::network::headers::{apply_conditional_headers, response_metadata, NOT_MODIFIED};
use crate::network::{NetworkRequest, Networking};
use crate::storage::DataStore;

/// Result of a rules download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesOutcome {
    /// A new rule set with this many rules was installed.
    Loaded { rules: usize },
    /// The server reported the cached rules as current.
    NotModified,
}

/// Fetches, caches and installs rule bundles.
pub struct RulesDownloader {
    network: Arc<dyn Networking>,
    cache: Arc<dyn CacheStore>,
    datastore: Arc<dyn DataStore>,
    engine: Arc<dyn RulesEngine>,
    assets: MessageAssetDownloader,
    timeout: Duration,
    max_size: u64,
}

impl RulesDownloader {
    pub fn new(
        network: Arc<dyn Networking>,
        cache: Arc<dyn CacheStore>,
        datastore: Arc<dyn DataStore>,
        engine: Arc<dyn RulesEngine>,
        assets: MessageAssetDownloader,
        timeout: Duration,
        max_size: u64,
    ) -> Self {
        RulesDownloader {
            network,
            cache,
            datastore,
            engine,
            assets,
            timeout,
            max_size,
        }
    }

    /// Downloads the bundle at `url` and installs its rules.
    ///
    /// `linkage_token` is sent as the `X-InApp-Auth` header when present.
    pub async fn load_rules_from_url(
        &self,
        url: &str,
        linkage_token: Option<&str>,
    ) -> Result<RulesOutcome, RulesError> {
        if url.is_empty() {
            warn!("Cannot download rules, the URL is empty. Cached rules will be used if present");
            return Err(RulesError::EmptyUrl);
        }

        let mut request = NetworkRequest::get(url, self.timeout);
        if let Some(cached) = self.cache.get(RULES_CACHE_NAMESPACE, RULES_JSON_FILE_NAME)? {
            request = apply_conditional_headers(request, &cached.metadata);
        }
        if let Some(token) = linkage_token.filter(|t| !t.is_empty()) {
            request = request.with_header(LINKAGE_FIELD_HEADER, token);
        }

        let response = self.network.connect(request).await?;
        match response.status {
            200 => {}
            NOT_MODIFIED => {
                trace!("Rules from {url} have not been modified, keeping the cached rules");
                return Ok(RulesOutcome::NotModified);
            }
            status => {
                error!("Received rules download response: {status}");
                return Err(RulesError::Status(status));
            }
        }

        let size = response.body.len() as u64;
        if size > self.max_size {
            return Err(RulesError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        let metadata = response_metadata(&response);
        let members = extract_members(&response.body, self.max_size)?;
        let definition = members
            .iter()
            .find(|m| m.name == RULES_JSON_FILE_NAME)
            .ok_or(RulesError::MissingRules)?;
        RuleSet::parse(&definition.data)?;

        if let Err(e) = self.store_bundle(members, &metadata) {
            // Without a definition the next request is unconditional.
            if let Err(remove_err) = self.cache.remove(RULES_CACHE_NAMESPACE, RULES_JSON_FILE_NAME)
            {
                error!("Failed to drop the cached rules definition: {remove_err}");
            }
            return Err(e);
        }

        let rules = self.read_cached_rules()?.ok_or(RulesError::MissingRules)?;
        let count = self.register_rules(rules).await;

        self.datastore.set_string(datastore_keys::REMOTE_URL, url)?;
        trace!("Persisted rules URL ({url})");

        Ok(RulesOutcome::Loaded { rules: count })
    }

    /// Installs the cached rules, if any. Returns the number of rules.
    pub async fn load_cached_rules(&self) -> Result<Option<usize>, RulesError> {
        match self.read_cached_rules()? {
            Some(rules) => Ok(Some(self.register_rules(rules).await)),
            None => {
                debug!("No cached rules found");
                Ok(None)
            }
        }
    }

    /// Uninstalls the active rules.
    pub fn uninstall_rules(&self) {
        self.engine.replace_rules(None);
    }

    /// Deletes the cached rules bundle.
    pub fn clear_cached_rules(&self) -> Result<(), RulesError> {
        self.cache.remove_namespace(RULES_CACHE_NAMESPACE)?;
        Ok(())
    }

    /// URL of the last successfully installed bundle.
    pub fn persisted_url(&self) -> Result<Option<String>, RulesError> {
        Ok(self
            .datastore
            .get_string(datastore_keys::REMOTE_URL)?
            .filter(|u| !u.is_empty()))
    }

    pub fn clear_persisted_url(&self) -> Result<(), RulesError> {
        self.datastore.remove(datastore_keys::REMOTE_URL)?;
        Ok(())
    }

    /// Caches the bundle members, writing the rules definition last.
    fn store_bundle(
        &self,
        members: Vec<ArchiveMember>,
        metadata: &CacheMetadata,
    ) -> Result<(), RulesError> {
        let names: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
        let (definition, support): (Vec<ArchiveMember>, Vec<ArchiveMember>) = members
            .into_iter()
            .partition(|m| m.name == RULES_JSON_FILE_NAME);

        for member in support {
            trace!("Caching rules bundle member ({})", member.name);
            self.cache.set(
                RULES_CACHE_NAMESPACE,
                &member.name,
                CacheEntry::new(member.data, metadata.clone()),
            )?;
        }
        for stale in self.cache.keys(RULES_CACHE_NAMESPACE)? {
            if !names.contains(&stale) {
                self.cache.remove(RULES_CACHE_NAMESPACE, &stale)?;
            }
        }
        for member in definition {
            self.cache.set(
                RULES_CACHE_NAMESPACE,
                &member.name,
                CacheEntry::new(member.data, metadata.clone()),
            )?;
        }
        Ok(())
    }

    fn read_cached_rules(&self) -> Result<Option<RuleSet>, RulesError> {
        match self.cache.get(RULES_CACHE_NAMESPACE, RULES_JSON_FILE_NAME)? {
            Some(cached) => Ok(Some(RuleSet::parse(&cached.data)?)),
            None => Ok(None),
        }
    }

    async fn register_rules(&self, rules: RuleSet) -> usize {
        let count = rules.rules.len();
        trace!("Registering {count} Campaign rule(s)");
        self.engine.replace_rules(Some(rules.clone()));
        self.cache_remote_assets(&rules).await;
        count
    }

    /// Prefetches the assets of fullscreen messages and drops cached assets
    /// of messages no longer present in `rules`.
    pub async fn cache_remote_assets(&self, rules: &RuleSet) {
        if rules.is_empty() {
            debug!("Cannot cache remote assets, the rule set is empty");
            return;
        }

        let mut loaded_ids: Vec<&str> = Vec::new();
        for consequence in rules.consequences().filter(|c| c.is_fullscreen_message()) {
            if consequence.id.is_empty() {
                debug!("Cannot download assets, consequence id is empty");
                continue;
            }
            loaded_ids.push(consequence.id.as_str());

            let assets = consequence.remote_assets();
            if assets.is_empty() {
                debug!(
                    "No remote assets found in consequence for message id {}",
                    consequence.id
                );
                continue;
            }
            if let Err(e) = self
                .assets
                .download_asset_collection(&assets, &consequence.id)
                .await
            {
                warn!("Failed to cache assets of message {}: {e}", consequence.id);
            }
        }

        let cached_ids = match self.cache.child_namespaces(MESSAGES_CACHE_NAMESPACE) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to list cached messages: {e}");
                return;
            }
        };
        for id in cached_ids {
            if loaded_ids.contains(&id.as_str()) {
                continue;
            }
            match self.cache.remove_namespace(&message_namespace(&id)) {
                Ok(()) => trace!("Removed cached assets of message {id}"),
                Err(e) => warn!("Failed to remove cached assets of message {id}: {e}"),
            }
        }
    }
}
