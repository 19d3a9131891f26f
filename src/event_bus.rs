//! Process-wide publish/subscribe channel.
//!
//! UI actions in the page (open settings, change zoom, move the window) are
//! published here instead of calling their handlers directly, so any number
//! of subscribers can react. Handlers run synchronously on the firing thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::preferences::PreferenceStore;

/// Persist one preference. Payload: [`SettingSet`].
pub const SETTINGS_SET: &str = "settings:set";
/// Open the desktop settings window. No payload.
pub const WINDOW_SETTINGS: &str = "window:settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSet {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn fire(&self, event: &str, payload: Option<Value>) {
        // Snapshot so handlers may subscribe or fire without deadlocking.
        let targets: Vec<Handler> = {
            let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
            handlers
                .get(event)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        log::debug!("BUS: {event} -> {} subscriber(s)", targets.len());
        for handler in targets {
            handler(payload.as_ref());
        }
    }

    pub fn fire_setting(&self, key: &str, value: Value) {
        let payload = SettingSet {
            key: key.to_string(),
            value,
        };
        match serde_json::to_value(&payload) {
            Ok(v) => self.fire(SETTINGS_SET, Some(v)),
            Err(e) => log::error!("BUS: could not encode setting {key}: {e}"),
        }
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }
}

/// Subscribe the preference store to `settings:set`.
pub fn persist_settings(bus: &EventBus, store: Arc<dyn PreferenceStore>) -> SubscriptionId {
    bus.on(SETTINGS_SET, move |payload| {
        let Some(payload) = payload else {
            log::warn!("PREFS: settings:set without payload");
            return;
        };
        match serde_json::from_value::<SettingSet>(payload.clone()) {
            Ok(SettingSet { key, value }) => {
                if let Err(e) = store.set(&key, value) {
                    log::error!("PREFS: failed to persist {key}: {e}");
                }
            }
            Err(e) => log::warn!("PREFS: malformed settings:set payload: {e}"),
        }
    })
}
