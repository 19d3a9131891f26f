//! Pending in-page script evaluations.
//!
//! The webview cannot hand back the value of an evaluated script directly.
//! The evaluated snippet reports back over IPC with the id it was given, and
//! the registry routes the value to whoever is waiting on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct ProbeRegistry {
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_id: AtomicU64,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        (id, rx)
    }

    /// Deliver a result. False when the id is unknown or the waiter gave up.
    pub fn resolve(&self, id: u64, value: Value) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => {
                log::debug!("PROBE: result for unknown probe {id}");
                false
            }
        }
    }

    /// Give up on one probe; its receiver observes a closed channel.
    pub fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub fn cancel_all(&self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Wraps `script` so that its truthiness is reported back as probe `id`.
pub fn reporting_script(id: u64, script: &str) -> String {
    format!(
        r#"(function() {{
    var value = false;
    try {{ value = !!({script}); }} catch (e) {{ value = false; }}
    var t = window.__TAURI__;
    var invoke = (t && t.core && t.core.invoke) || (window.__TAURI_INTERNALS__ && window.__TAURI_INTERNALS__.invoke);
    if (invoke) {{ invoke('probe_resolve', {{ id: {id}, value: value }}); }}
}})();"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_reaches_the_waiter() {
        let registry = ProbeRegistry::new();
        let (id, rx) = registry.register();
        assert_eq!(registry.pending(), 1);

        assert!(registry.resolve(id, json!(true)));
        assert_eq!(rx.await.unwrap(), json!(true));
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn ids_are_unique_and_resolve_once() {
        let registry = ProbeRegistry::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a, b);

        assert!(registry.resolve(a, json!(false)));
        assert!(!registry.resolve(a, json!(false)));
    }

    #[tokio::test]
    async fn forget_closes_one_receiver() {
        let registry = ProbeRegistry::new();
        let (a, rx_a) = registry.register();
        let (b, rx_b) = registry.register();
        registry.forget(a);
        assert!(rx_a.await.is_err());
        assert!(registry.resolve(b, json!(true)));
        assert_eq!(rx_b.await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn cancel_closes_receivers() {
        let registry = ProbeRegistry::new();
        let (_, rx) = registry.register();
        registry.cancel_all();
        assert!(rx.await.is_err());
    }

    #[test]
    fn reporting_script_carries_id_and_expression() {
        let js = reporting_script(7, "history.length > 1");
        assert!(js.contains("!!(history.length > 1)"));
        assert!(js.contains("id: 7"));
        assert!(js.contains("'probe_resolve'"));
    }
}
