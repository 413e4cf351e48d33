// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registration record and the registration-due policy.

use tracing::{debug, trace};

use super::CampaignState;
use crate::config::datastore_keys;
use crate::storage::{DataStore, StorageError};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Last confirmed registration, persisted in the data store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRecord {
    /// Completion time of the last delivered registration (epoch millis).
    pub timestamp: Option<i64>,
    /// Client identifier that registration was sent for.
    pub client_id: Option<String>,
}

impl RegistrationRecord {
    /// Reads the record from the data store.
    pub fn load(store: &dyn DataStore) -> Result<Self, StorageError> {
        Ok(RegistrationRecord {
            timestamp: store.get_long(datastore_keys::REGISTRATION_TIMESTAMP)?,
            client_id: store
                .get_string(datastore_keys::CLIENT_ID)?
                .filter(|id| !id.is_empty()),
        })
    }

    /// Persists a delivered registration.
    pub fn save(&self, store: &dyn DataStore) -> Result<(), StorageError> {
        match self.timestamp {
            Some(ts) => store.set_long(datastore_keys::REGISTRATION_TIMESTAMP, ts)?,
            None => store.remove(datastore_keys::REGISTRATION_TIMESTAMP)?,
        }
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => store.set_string(datastore_keys::CLIENT_ID, id)?,
            _ => store.remove(datastore_keys::CLIENT_ID)?,
        }
        trace!(
            "Persisted registration record (timestamp {:?}, client id {:?})",
            self.timestamp,
            self.client_id
        );
        Ok(())
    }
}

/// Decides whether a registration hit should be queued at `now_ms`.
///
/// Paused registration vetoes everything, then a changed client id is always
/// due, otherwise the configured number of days must have elapsed.
pub fn should_send_registration(
    state: &CampaignState,
    record: &RegistrationRecord,
    now_ms: i64,
) -> bool {
    if !state.can_register() {
        debug!("Campaign is not configured to send a registration request");
        return false;
    }

    if state.registration_paused {
        debug!("Registration requests are paused");
        return false;
    }

    if record.client_id.as_deref() != Some(state.client_id.as_str()) {
        debug!(
            "The current client id ({}) is new, sending the registration request",
            state.client_id
        );
        return true;
    }

    let delay_ms = i64::from(state.registration_delay_days) * MILLIS_PER_DAY;
    let last = record.timestamp.unwrap_or(-1);
    if now_ms.saturating_sub(last) >= delay_ms {
        debug!(
            "Registration delay of {} days has elapsed, sending the registration request",
            state.registration_delay_days
        );
        return true;
    }

    debug!(
        "Registration delay of {} days has not elapsed",
        state.registration_delay_days
    );
    false
}
