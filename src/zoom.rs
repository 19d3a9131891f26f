//! Page zoom driven by Ctrl+Minus / Ctrl+Plus / Ctrl+0.

use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::event_bus::EventBus;
use crate::preferences::{PreferenceStore, KEY_ZOOM};
use crate::surface::{ContentSurface, KeyEvent};

pub const ZOOM_STEP: f64 = 0.1;
pub const ZOOM_RESET: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomCommand {
    Out,
    In,
    Reset,
}

impl ZoomCommand {
    /// Only Ctrl-modified `-`, `+`/`=` and `0` are zoom commands.
    pub fn from_key(event: &KeyEvent) -> Option<Self> {
        if !event.ctrl {
            return None;
        }
        match event.key.as_str() {
            "-" => Some(ZoomCommand::Out),
            "+" | "=" => Some(ZoomCommand::In),
            "0" => Some(ZoomCommand::Reset),
            _ => None,
        }
    }
}

pub struct ZoomController {
    factor: Mutex<f64>,
    min: f64,
    max: f64,
    surface: Arc<dyn ContentSurface>,
    bus: Arc<EventBus>,
}

impl ZoomController {
    /// Restore the saved factor and apply it right away.
    pub fn attach(
        prefs: &dyn PreferenceStore,
        surface: Arc<dyn ContentSurface>,
        bus: Arc<EventBus>,
        min: f64,
        max: f64,
    ) -> Self {
        let saved = prefs.get_f64(KEY_ZOOM).unwrap_or(ZOOM_RESET);
        let factor = saved.clamp(min, max);
        if factor != saved {
            log::warn!("ZOOM: saved factor {saved} outside [{min}, {max}], using {factor}");
        }
        surface.set_zoom_factor(factor);
        log::info!("ZOOM: restored factor {factor}");
        ZoomController {
            factor: Mutex::new(factor),
            min,
            max,
            surface,
            bus,
        }
    }

    pub fn factor(&self) -> f64 {
        *self.factor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-apply the current factor, e.g. after the page reloaded.
    pub fn reapply(&self) {
        self.surface.set_zoom_factor(self.factor());
    }

    /// Returns the new factor when the key was a zoom command.
    pub fn handle_key(&self, event: &KeyEvent) -> Option<f64> {
        let command = ZoomCommand::from_key(event)?;
        Some(self.apply(command))
    }

    pub fn apply(&self, command: ZoomCommand) -> f64 {
        let factor = {
            let mut factor = self.factor.lock().unwrap_or_else(|e| e.into_inner());
            let next = match command {
                ZoomCommand::Out => *factor - ZOOM_STEP,
                ZoomCommand::In => *factor + ZOOM_STEP,
                ZoomCommand::Reset => ZOOM_RESET,
            };
            *factor = next.clamp(self.min, self.max);
            *factor
        };
        self.surface.set_zoom_factor(factor);
        self.bus.fire_setting(KEY_ZOOM, json!(factor));
        log::debug!("ZOOM: {command:?} -> {factor}");
        factor
    }
}
