//! Event System
//!
//! Outbound events of the Campaign extension.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Context data key of the message id.
pub const MESSAGE_ID_KEY: &str = "a.message.id";
/// Context data key set when a message was viewed.
pub const MESSAGE_VIEWED_KEY: &str = "a.message.viewed";
/// Context data key set when a message was clicked.
pub const MESSAGE_CLICKED_KEY: &str = "a.message.clicked";

/// Events emitted by the Campaign extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignEvent {
    /// A message was viewed or clicked.
    MessageInteraction {
        /// `a.message.id` plus `a.message.viewed` or `a.message.clicked`.
        context_data: BTreeMap<String, String>,
    },

    /// A rule set was installed.
    RulesInstalled {
        /// Number of installed rules.
        rule_count: usize,
    },
}

/// Receiver of [`CampaignEvent`]s.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: CampaignEvent);
}

/// [`EventHandler`] backed by a closure.
pub struct CallbackHandler<F>(F);

impl<F> CallbackHandler<F>
where
    F: Fn(CampaignEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        CallbackHandler(callback)
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(CampaignEvent) + Send + Sync,
{
    fn on_event(&self, event: CampaignEvent) {
        (self.0)(event);
    }
}

/// Fans Campaign events out to the registered handlers, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: CampaignEvent) {
        for handler in &self.handlers {
            handler.on_event(event.clone());
        }
    }
}

/// Builds the interaction context for a tracking action.
///
/// Only actions `1` (viewed) and `2` (clicked) produce an event; the
/// hexadecimal delivery id becomes the decimal message id.
pub fn message_interaction(action: &str, delivery_id: &str) -> Option<CampaignEvent> {
    let action_key = match action {
        "1" => MESSAGE_VIEWED_KEY,
        "2" => MESSAGE_CLICKED_KEY,
        _ => return None,
    };
    let message_id = u64::from_str_radix(delivery_id, 16).ok()?;

    let mut context_data = BTreeMap::new();
    context_data.insert(MESSAGE_ID_KEY.to_string(), message_id.to_string());
    context_data.insert(action_key.to_string(), "1".to_string());
    Some(CampaignEvent::MessageInteraction { context_data })
}
