// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! State Gate
//!
//! Holds the merged configuration and identity snapshot and answers the
//! policy questions that decide whether a network operation may run.
//! A snapshot is rebuilt wholesale from shared state on every change and is
//! never mutated in place.

mod registration;

pub use registration::{should_send_registration, RegistrationRecord};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::{
    config_keys, identity_keys, DEFAULT_REGISTRATION_DELAY_DAYS, DEFAULT_TIMEOUT_SECS,
};

/// Shared state as published by another extension.
pub type SharedState = Map<String, Value>;

/// Privacy status from the `global.privacy` configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrivacyStatus {
    /// Data collection is allowed.
    OptIn,
    /// Data collection is forbidden; pending data is purged.
    OptOut,
    /// Undecided; pending data is kept but nothing is sent.
    #[default]
    Unknown,
}

impl PrivacyStatus {
    /// Parses the configuration string value. Anything unrecognised is `Unknown`.
    pub fn from_config_value(value: &str) -> Self {
        match value {
            "optedin" => PrivacyStatus::OptIn,
            "optedout" => PrivacyStatus::OptOut,
            _ => PrivacyStatus::Unknown,
        }
    }

    /// Configuration string value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::OptIn => "optedin",
            PrivacyStatus::OptOut => "optedout",
            PrivacyStatus::Unknown => "optunknown",
        }
    }
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of everything the Campaign extension needs from configuration and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignState {
    /// Campaign marketing server host.
    pub server: String,
    /// Campaign property key used in registration URLs.
    pub pkey: String,
    /// Host serving the rules bundle index.
    pub mcias: String,
    /// Launch property id.
    pub property_id: String,
    /// Request timeout in seconds.
    pub timeout_secs: u32,
    /// Days between registration requests for an unchanged client id.
    pub registration_delay_days: u32,
    /// When set, no registration request is queued.
    pub registration_paused: bool,
    /// Current privacy status.
    pub privacy: PrivacyStatus,
    /// Client identifier (ECID).
    pub client_id: String,
}

impl Default for CampaignState {
    fn default() -> Self {
        CampaignState {
            server: String::new(),
            pkey: String::new(),
            mcias: String::new(),
            property_id: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            registration_delay_days: DEFAULT_REGISTRATION_DELAY_DAYS,
            registration_paused: false,
            privacy: PrivacyStatus::Unknown,
            client_id: String::new(),
        }
    }
}

impl CampaignState {
    /// Builds a snapshot from configuration and identity shared state.
    ///
    /// A missing half leaves its fields at their defaults.
    pub fn from_shared_state(config: Option<&SharedState>, identity: Option<&SharedState>) -> Self {
        let mut state = CampaignState::default();

        match config {
            Some(config) => {
                state.server = opt_string(config, config_keys::SERVER);
                state.pkey = opt_string(config, config_keys::PKEY);
                state.mcias = opt_string(config, config_keys::MCIAS);
                state.property_id = opt_string(config, config_keys::PROPERTY_ID);
                state.timeout_secs = opt_u32(config, config_keys::TIMEOUT, DEFAULT_TIMEOUT_SECS);
                state.registration_delay_days = opt_u32(
                    config,
                    config_keys::REGISTRATION_DELAY,
                    DEFAULT_REGISTRATION_DELAY_DAYS,
                );
                state.registration_paused = config
                    .get(config_keys::REGISTRATION_PAUSED)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                state.privacy =
                    PrivacyStatus::from_config_value(&opt_string(config, config_keys::PRIVACY));
            }
            None => debug!("Cannot set configuration properties, config shared state is absent"),
        }

        match identity {
            Some(identity) => state.client_id = opt_string(identity, identity_keys::CLIENT_ID),
            None => debug!("Cannot set identity properties, identity shared state is absent"),
        }

        state
    }

    /// True iff a registration request may be sent.
    pub fn can_register(&self) -> bool {
        if self.privacy != PrivacyStatus::OptIn {
            trace!("Cannot register with Campaign, privacy status is {}", self.privacy);
            return false;
        }

        !self.client_id.is_empty() && !self.server.is_empty() && !self.pkey.is_empty()
    }

    /// True iff the rules bundle may be downloaded.
    pub fn can_download_rules(&self) -> bool {
        if self.privacy != PrivacyStatus::OptIn {
            trace!("Cannot download rules, privacy status is {}", self.privacy);
            return false;
        }

        !self.client_id.is_empty()
            && !self.server.is_empty()
            && !self.mcias.is_empty()
            && !self.property_id.is_empty()
    }

    /// True iff a message tracking request may be sent.
    pub fn can_send_track_info(&self) -> bool {
        if self.privacy != PrivacyStatus::OptIn {
            trace!("Cannot send track request, privacy status is {}", self.privacy);
            return false;
        }

        !self.client_id.is_empty() && !self.server.is_empty()
    }
}

fn opt_string(map: &SharedState, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn opt_u32(map: &SharedState, key: &str, default: u32) -> u32 {
    map.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}
