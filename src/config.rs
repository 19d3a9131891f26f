//! Shell configuration: where the player lives and how the shell behaves.
//!
//! Defaults match the hosted player. Any value can be overridden through the
//! environment (or a `.env` file picked up by `dotenvy` at startup).

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_APP_URL: &str = "https://play.google.com/music/listen";
pub const DEFAULT_HOME_URL: &str = "https://play.google.com/music/listen#/now";
pub const DEFAULT_MENU_POLL: Duration = Duration::from_millis(500);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_ZOOM_MIN: f64 = 0.25;
pub const DEFAULT_ZOOM_MAX: f64 = 3.0;

pub const ENV_APP_URL: &str = "GPM_APP_URL";
pub const ENV_HOME_URL: &str = "GPM_HOME_URL";
pub const ENV_MENU_POLL_MS: &str = "GPM_MENU_POLL_MS";
pub const ENV_PROBE_TIMEOUT_MS: &str = "GPM_PROBE_TIMEOUT_MS";
pub const ENV_ZOOM_MIN: &str = "GPM_ZOOM_MIN";
pub const ENV_ZOOM_MAX: &str = "GPM_ZOOM_MAX";

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Page loaded into the window at startup.
    pub app_url: String,
    /// Landing view that "back" falls through to.
    pub home_url: String,
    /// Interval of the periodic menu-item correction.
    pub menu_poll_interval: Duration,
    /// How long a back-navigation history probe may stay unresolved.
    pub probe_timeout: Duration,
    pub zoom_min: f64,
    pub zoom_max: f64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            app_url: DEFAULT_APP_URL.to_string(),
            home_url: DEFAULT_HOME_URL.to_string(),
            menu_poll_interval: DEFAULT_MENU_POLL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            zoom_min: DEFAULT_ZOOM_MIN,
            zoom_max: DEFAULT_ZOOM_MAX,
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ShellConfig::default();

        if let Some(url) = lookup(ENV_APP_URL).filter(|s| !s.trim().is_empty()) {
            config.app_url = url.trim().to_string();
        }
        if let Some(url) = lookup(ENV_HOME_URL).filter(|s| !s.trim().is_empty()) {
            config.home_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_MENU_POLL_MS) {
            config.menu_poll_interval = millis(ENV_MENU_POLL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PROBE_TIMEOUT_MS) {
            config.probe_timeout = millis(ENV_PROBE_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ZOOM_MIN) {
            config.zoom_min = positive(ENV_ZOOM_MIN, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ZOOM_MAX) {
            config.zoom_max = positive(ENV_ZOOM_MAX, &raw)?;
        }
        if config.zoom_min > config.zoom_max {
            return Err(ConfigError::InvertedZoomBounds {
                min: config.zoom_min,
                max: config.zoom_max,
            });
        }

        Ok(config)
    }
}

fn positive(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NotPositive { key, value });
    }
    Ok(value)
}

fn millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let ms = positive(key, raw)?;
    Ok(Duration::from_millis(ms.round() as u64))
}
