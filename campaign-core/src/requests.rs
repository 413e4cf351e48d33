// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Campaign request builders.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::state::CampaignState;

/// Push platform reported in registration payloads.
pub const PUSH_PLATFORM: &str = "gcm";

/// Registration endpoint for the state's server, property key and client id.
pub fn registration_url(state: &CampaignState) -> String {
    format!(
        "https://{}/rest/head/mobileAppV5/{}/subscriptions/{}",
        state.server, state.pkey, state.client_id
    )
}

/// JSON body of a registration request.
pub fn registration_payload(platform: &str, client_id: &str) -> String {
    let mut body = BTreeMap::new();
    body.insert("pushPlatform", platform);
    body.insert("marketingCloudId", client_id);
    // A map of string pairs always serializes.
    serde_json::to_string(&body).unwrap_or_default()
}

/// Extracts the client id from a registration payload.
pub fn registration_client_id(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value
        .get("marketingCloudId")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Message tracking endpoint.
pub fn tracking_url(
    state: &CampaignState,
    broadlog_id: &str,
    delivery_id: &str,
    action: &str,
) -> String {
    format!(
        "https://{}/r/?id={},{},{}&mcId={}",
        state.server, broadlog_id, delivery_id, action, state.client_id
    )
}

/// Rules bundle download URL.
pub fn rules_url(state: &CampaignState) -> String {
    format!(
        "https://{}/{}/{}/{}/rules.zip",
        state.mcias, state.server, state.property_id, state.client_id
    )
}

/// Encodes linkage fields into the personalization token.
///
/// Returns `None` for an empty map.
pub fn encode_linkage_fields(fields: &BTreeMap<String, String>) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let json = serde_json::to_string(fields).ok()?;
    Some(STANDARD.encode(json.as_bytes()))
}
