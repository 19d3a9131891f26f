//! Per-window wiring of the zoom and back-navigation controllers.
//!
//! A session lives as long as its window. Event-bus subscriptions made
//! through it are released by [`ShellSession::teardown`], which the host
//! calls when the window closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::ShellConfig;
use crate::event_bus::{EventBus, SubscriptionId};
use crate::navigation::{BackOutcome, NavigationGuard};
use crate::preferences::PreferenceStore;
use crate::surface::{ContentSurface, KeyEvent};
use crate::zoom::ZoomController;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyOutcome {
    Zoomed(f64),
    Back(BackOutcome),
    Ignored,
}

pub struct ShellSession {
    bus: Arc<EventBus>,
    surface: Arc<dyn ContentSurface>,
    zoom: ZoomController,
    nav: Arc<NavigationGuard>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    closed: AtomicBool,
}

impl ShellSession {
    /// Called once the page has loaded: restores zoom and installs the back button.
    pub fn start(
        config: &ShellConfig,
        prefs: &dyn PreferenceStore,
        bus: Arc<EventBus>,
        surface: Arc<dyn ContentSurface>,
    ) -> Self {
        let zoom = ZoomController::attach(
            prefs,
            Arc::clone(&surface),
            Arc::clone(&bus),
            config.zoom_min,
            config.zoom_max,
        );
        let nav = NavigationGuard::install(
            Arc::clone(&surface),
            &config.home_url,
            None,
            config.probe_timeout,
        );
        ShellSession {
            bus,
            surface,
            zoom,
            nav: Arc::new(nav),
            subscriptions: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn navigation(&self) -> Arc<NavigationGuard> {
        Arc::clone(&self.nav)
    }

    /// Subscribe for the lifetime of this window.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let id = self.bus.on(event, handler);
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id);
        id
    }

    /// Zoom shortcuts take precedence; a plain Backspace falls through to back.
    pub async fn handle_key(&self, event: &KeyEvent) -> KeyOutcome {
        if let Some(factor) = self.zoom.handle_key(event) {
            return KeyOutcome::Zoomed(factor);
        }
        match self.nav.on_key_up(event).await {
            Some(outcome) => KeyOutcome::Back(outcome),
            None => KeyOutcome::Ignored,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Safe to call more than once.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for id in &ids {
            self.bus.off(*id);
        }
        self.surface.detach();
        log::info!("SESSION: torn down ({} subscription(s) released)", ids.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{persist_settings, WINDOW_SETTINGS};
    use crate::navigation::tests::{Action, FakePage, ALBUM, HOME};
    use crate::navigation::HIDDEN;
    use crate::preferences::{MemoryPreferences, KEY_ZOOM};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn config() -> ShellConfig {
        ShellConfig {
            app_url: HOME.to_string(),
            home_url: HOME.to_string(),
            ..ShellConfig::default()
        }
    }

    #[test]
    fn start_applies_zoom_and_hides_back_on_home() {
        let page = FakePage::silent();
        let prefs = MemoryPreferences::with_values([(KEY_ZOOM, json!(1.5))]);
        ShellSession::start(&config(), &prefs, Arc::new(EventBus::new()), page.clone());

        assert_eq!(page.actions(), vec![Action::Zoom(1.5), Action::Opacity(HIDDEN)]);
    }

    #[tokio::test]
    async fn back_waits_for_the_first_location_report() {
        let page = FakePage::answering(true);
        let session = ShellSession::start(
            &ShellConfig::default(),
            &MemoryPreferences::new(),
            Arc::new(EventBus::new()),
            page.clone(),
        );
        let nav = session.navigation();

        assert_eq!(page.last_opacity(), Some(HIDDEN));
        assert!(!nav.can_go_back());
        assert_eq!(nav.attempt_back().await, BackOutcome::NotPermitted);
        assert!(page.navigation().is_empty());

        nav.on_popstate(ALBUM);
        assert_eq!(nav.attempt_back().await, BackOutcome::HistoryPopped);
    }

    #[tokio::test]
    async fn keys_route_to_zoom_then_back() {
        let page = FakePage::answering(false);
        let prefs = Arc::new(MemoryPreferences::new());
        let bus = Arc::new(EventBus::new());
        persist_settings(&bus, prefs.clone());
        let session = ShellSession::start(&config(), prefs.as_ref(), bus, page.clone());

        let zoomed = session.handle_key(&KeyEvent::with_ctrl("=")).await;
        assert!(matches!(zoomed, KeyOutcome::Zoomed(f) if (f - 1.1).abs() < 1e-9));
        assert!((prefs.get_f64(KEY_ZOOM).unwrap() - 1.1).abs() < 1e-9);

        assert_eq!(
            session.handle_key(&KeyEvent::plain("Backspace")).await,
            KeyOutcome::Back(BackOutcome::NotPermitted)
        );
        session.navigation().on_popstate(ALBUM);
        assert_eq!(
            session.handle_key(&KeyEvent::plain("Backspace")).await,
            KeyOutcome::Back(BackOutcome::NavigatedHome)
        );
        assert_eq!(session.handle_key(&KeyEvent::plain("k")).await, KeyOutcome::Ignored);
    }

    #[test]
    fn teardown_releases_subscriptions_once() {
        let page = FakePage::silent();
        let bus = Arc::new(EventBus::new());
        let session = ShellSession::start(&config(), &MemoryPreferences::new(), Arc::clone(&bus), page.clone());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        session.subscribe(WINDOW_SETTINGS, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.fire(WINDOW_SETTINGS, None);
        session.teardown();
        session.teardown();
        bus.fire(WINDOW_SETTINGS, None);

        assert!(session.is_closed());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            page.actions().iter().filter(|a| **a == Action::Detach).count(),
            1
        );
    }
}
