use std::sync::{Arc, Mutex};
use std::time::Duration;

use gpm_shell_lib::config::ShellConfig;
use gpm_shell_lib::event_bus::{persist_settings, EventBus};
use gpm_shell_lib::navigation::{BackOutcome, HIDDEN, VISIBLE};
use gpm_shell_lib::preferences::{MemoryPreferences, PreferenceStore, KEY_ZOOM};
use gpm_shell_lib::session::{KeyOutcome, ShellSession};
use gpm_shell_lib::surface::{ContentSurface, Evaluation, KeyEvent};
use serde_json::json;
use tokio::sync::oneshot;

const HOME: &str = "https://play.google.com/music/listen#/now";
const ARTIST: &str = "https://play.google.com/music/listen#/artist/Aabc";

/// Page stand-in with a real history stack, answering probes from it.
#[derive(Default)]
struct Page {
    opacity: Mutex<Option<f64>>,
    history: Mutex<Vec<String>>,
    zoom: Mutex<Option<f64>>,
}

impl Page {
    fn opacity(&self) -> Option<f64> {
        *self.opacity.lock().unwrap()
    }

    fn location(&self) -> Option<String> {
        self.history.lock().unwrap().last().cloned()
    }

    fn visit(&self, url: &str) {
        self.history.lock().unwrap().push(url.to_string());
    }
}

impl ContentSurface for Page {
    fn set_zoom_factor(&self, factor: f64) {
        *self.zoom.lock().unwrap() = Some(factor);
    }

    fn set_back_opacity(&self, opacity: f64) {
        *self.opacity.lock().unwrap() = Some(opacity);
    }

    fn history_back(&self) {
        self.history.lock().unwrap().pop();
    }

    fn navigate_to(&self, url: &str) {
        self.visit(url);
    }

    fn execute(&self, _script: &str) -> Evaluation {
        let (tx, rx) = oneshot::channel();
        let has_history = self.history.lock().unwrap().len() > 1;
        let _ = tx.send(json!(has_history));
        Evaluation { id: 0, result: rx }
    }
}

fn start(page: &Arc<Page>, prefs: Arc<MemoryPreferences>) -> ShellSession {
    let bus = Arc::new(EventBus::new());
    persist_settings(&bus, prefs.clone());
    let config = ShellConfig {
        app_url: HOME.to_string(),
        home_url: HOME.to_string(),
        probe_timeout: Duration::from_secs(1),
        ..ShellConfig::default()
    };
    page.visit(HOME);
    ShellSession::start(&config, prefs.as_ref(), bus, page.clone())
}

#[test]
fn back_button_follows_location_and_search() {
    let page = Arc::new(Page::default());
    let session = start(&page, Arc::new(MemoryPreferences::new()));
    let nav = session.navigation();

    assert_eq!(page.opacity(), Some(HIDDEN));

    page.visit(ARTIST);
    nav.on_popstate(ARTIST);
    assert_eq!(page.opacity(), Some(VISIBLE));

    nav.on_search_input("beatles");
    assert_eq!(page.opacity(), Some(HIDDEN));
    assert!(!nav.can_go_back());
}

#[tokio::test]
async fn back_pops_history_then_stops_at_home() {
    let page = Arc::new(Page::default());
    let session = start(&page, Arc::new(MemoryPreferences::new()));
    let nav = session.navigation();

    page.visit(ARTIST);
    nav.on_popstate(ARTIST);

    assert_eq!(nav.attempt_back().await, BackOutcome::HistoryPopped);
    assert_eq!(page.location().as_deref(), Some(HOME));
    nav.on_popstate(HOME);
    assert_eq!(page.opacity(), Some(HIDDEN));

    assert_eq!(nav.attempt_back().await, BackOutcome::NotPermitted);
    assert_eq!(page.location().as_deref(), Some(HOME));
}

#[tokio::test]
async fn deep_link_without_history_falls_back_home() {
    let page = Arc::new(Page::default());
    let session = start(&page, Arc::new(MemoryPreferences::new()));
    let nav = session.navigation();

    // Reload on a deep link: the page's history holds a single entry.
    page.history.lock().unwrap().clear();
    page.visit(ARTIST);
    nav.on_popstate(ARTIST);

    let outcome = session.handle_key(&KeyEvent::plain("Backspace")).await;
    assert_eq!(outcome, KeyOutcome::Back(BackOutcome::NavigatedHome));
    assert_eq!(page.location().as_deref(), Some(HOME));
}

#[tokio::test]
async fn zoom_survives_a_restart() {
    let prefs = Arc::new(MemoryPreferences::new());
    {
        let page = Arc::new(Page::default());
        let session = start(&page, prefs.clone());
        session.handle_key(&KeyEvent::with_ctrl("=")).await;
        session.handle_key(&KeyEvent::with_ctrl("=")).await;
        session.teardown();
    }
    let saved = prefs.get_f64(KEY_ZOOM).unwrap();
    assert!((saved - 1.2).abs() < 1e-9);

    let page = Arc::new(Page::default());
    let session = start(&page, prefs);
    assert_eq!(*page.zoom.lock().unwrap(), Some(saved));
    assert_eq!(session.zoom().factor(), saved);
}
