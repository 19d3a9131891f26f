//! Back-navigation affordance for the hosted player.
//!
//! The page reports its location (on every `popstate`) and the contents of
//! its search box (on every `input`). From those two observations the guard
//! decides whether "back" makes sense, keeps the button's opacity in step,
//! and performs the back action itself: pop the page's own history when it
//! has any, otherwise jump straight to the home view.
//!
//! Until the page has reported a location, back is not offered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::surface::{ContentSurface, KeyEvent};

/// Evaluated in the page to learn whether it has history to go back to.
pub const PROBE_CAN_GO_BACK: &str = "(window.navigation && typeof window.navigation.canGoBack === 'boolean') ? window.navigation.canGoBack : window.history.length > 1";

pub const VISIBLE: f64 = 1.0;
pub const HIDDEN: f64 = 0.0;

/// Inputs of the back decision. Rebuilt from the latest observations on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavState<'a> {
    pub current_url: &'a str,
    pub home_url: &'a str,
    pub search_query: &'a str,
}

impl NavState<'_> {
    /// Back is offered everywhere except on the home view and while searching.
    pub fn can_go_back(&self) -> bool {
        let at_home = self.current_url == self.home_url;
        let searching = !self.search_query.is_empty();
        !(at_home || searching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// At home or searching; nothing happened.
    NotPermitted,
    /// Another back attempt is still waiting on its probe.
    Busy,
    HistoryPopped,
    NavigatedHome,
    /// The page went away before answering the probe.
    ProbeDropped,
    ProbeTimedOut,
}

#[derive(Debug)]
struct Observed {
    location: Option<String>,
    search_query: String,
}

/// Page reports that arrived before a guard existed to receive them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    pub location: Option<String>,
    pub search_query: Option<String>,
}

pub struct NavigationGuard {
    home_url: String,
    probe_timeout: Duration,
    surface: Arc<dyn ContentSurface>,
    observed: Mutex<Observed>,
    probe_in_flight: AtomicBool,
}

/// Clears the in-flight flag however the attempt ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Abandons the history evaluation unless it was answered first.
struct Outstanding<'a> {
    surface: &'a dyn ContentSurface,
    id: u64,
}

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.surface.abandon(self.id);
    }
}

impl NavigationGuard {
    /// Creates the guard and performs the initial visibility sync.
    /// `initial_location` is `None` when the page has not reported one yet.
    pub fn install(
        surface: Arc<dyn ContentSurface>,
        home_url: &str,
        initial_location: Option<&str>,
        probe_timeout: Duration,
    ) -> Self {
        let guard = NavigationGuard {
            home_url: home_url.to_string(),
            probe_timeout,
            surface,
            observed: Mutex::new(Observed {
                location: initial_location.map(str::to_string),
                search_query: String::new(),
            }),
            probe_in_flight: AtomicBool::new(false),
        };
        guard.sync_affordance();
        log::info!("NAV: back button installed (home: {})", guard.home_url);
        guard
    }

    pub fn can_go_back(&self) -> bool {
        let observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
        match &observed.location {
            Some(location) => NavState {
                current_url: location,
                home_url: &self.home_url,
                search_query: &observed.search_query,
            }
            .can_go_back(),
            None => false,
        }
    }

    pub fn on_popstate(&self, location: &str) {
        {
            let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
            observed.location = Some(location.to_string());
        }
        log::debug!("NAV: location -> {location}");
        self.sync_affordance();
    }

    pub fn on_search_input(&self, query: &str) {
        {
            let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
            observed.search_query = query.to_string();
        }
        self.sync_affordance();
    }

    /// Applies reports the page sent before this guard was installed.
    pub fn replay(&self, report: PageReport) {
        {
            let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(location) = report.location {
                observed.location = Some(location);
            }
            if let Some(query) = report.search_query {
                observed.search_query = query;
            }
        }
        self.sync_affordance();
    }

    /// Returns the opacity that was applied.
    pub fn sync_affordance(&self) -> f64 {
        let opacity = if self.can_go_back() { VISIBLE } else { HIDDEN };
        self.surface.set_back_opacity(opacity);
        opacity
    }

    /// Plain Backspace outside editable controls acts like the back button.
    pub async fn on_key_up(&self, event: &KeyEvent) -> Option<BackOutcome> {
        if event.key != "Backspace" || event.ctrl || event.editable_focus {
            return None;
        }
        Some(self.attempt_back().await)
    }

    pub async fn attempt_back(&self) -> BackOutcome {
        if !self.can_go_back() {
            return BackOutcome::NotPermitted;
        }
        if self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("NAV: back ignored, probe already pending");
            return BackOutcome::Busy;
        }
        let _in_flight = InFlight(&self.probe_in_flight);

        let evaluation = self.surface.execute(PROBE_CAN_GO_BACK);
        let _outstanding = Outstanding {
            surface: self.surface.as_ref(),
            id: evaluation.id,
        };
        let has_history = match tokio::time::timeout(self.probe_timeout, evaluation.result).await {
            Ok(Ok(value)) => value.as_bool().unwrap_or(false),
            Ok(Err(_)) => {
                log::warn!("NAV: history probe dropped before answering");
                return BackOutcome::ProbeDropped;
            }
            Err(_) => {
                log::warn!("NAV: history probe timed out after {:?}", self.probe_timeout);
                return BackOutcome::ProbeTimedOut;
            }
        };

        // The user may have reached home or started searching meanwhile.
        if !self.can_go_back() {
            return BackOutcome::NotPermitted;
        }
        if has_history {
            self.surface.history_back();
            BackOutcome::HistoryPopped
        } else {
            log::info!("NAV: no page history, going home");
            self.surface.navigate_to(&self.home_url);
            BackOutcome::NavigatedHome
        }
    }
}
