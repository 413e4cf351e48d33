//! Rule set representation handed to the rules engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RulesError;

/// Consequence type of in-app messages.
pub const MESSAGE_CONSEQUENCE_TYPE: &str = "iam";

/// Message template whose assets are cached ahead of display.
pub const FULLSCREEN_TEMPLATE: &str = "fullscreen";

/// A parsed rules definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One trigger predicate and its consequences.
///
/// The condition is kept opaque for the matching engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub condition: Value,
    #[serde(default)]
    pub consequences: Vec<RuleConsequence>,
}

/// Action attached to a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConsequence {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl RuleSet {
    /// Parses a `rules.json` document.
    pub fn parse(data: &[u8]) -> Result<Self, RulesError> {
        serde_json::from_slice(data).map_err(|e| RulesError::Parse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every consequence of every rule, in document order.
    pub fn consequences(&self) -> impl Iterator<Item = &RuleConsequence> {
        self.rules.iter().flat_map(|rule| rule.consequences.iter())
    }
}

impl RuleConsequence {
    /// `template` of the consequence detail, if any.
    pub fn template(&self) -> Option<&str> {
        self.detail.get("template").and_then(Value::as_str)
    }

    /// True for in-app fullscreen messages.
    pub fn is_fullscreen_message(&self) -> bool {
        self.kind == MESSAGE_CONSEQUENCE_TYPE && self.template() == Some(FULLSCREEN_TEMPLATE)
    }

    /// Flattened `remoteAssets` of the consequence detail.
    ///
    /// The detail holds a list of lists of URLs; non-string items are ignored.
    pub fn remote_assets(&self) -> Vec<String> {
        self.detail
            .get("remoteAssets")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(Value::as_array)
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Rule matching engine.
pub trait RulesEngine: Send + Sync {
    /// Replaces the active rules; `None` uninstalls them.
    fn replace_rules(&self, rules: Option<RuleSet>);

    /// Evaluates an event and returns the triggered consequences.
    fn process(&self, event: &Value) -> Vec<RuleConsequence>;
}
