//! Desktop shell around the Google Play Music web player.
//!
//! The shell opens the player in a native window, patches the page so it
//! behaves like a desktop app, keeps a back button in step with in-page
//! navigation, and persists window geometry and zoom between runs.
//!
//! Everything outside the Tauri host module is independent of the webview, so it
//! builds and tests without the `shell` feature.

pub mod config;
pub mod dom_patch;
pub mod error;
pub mod event_bus;
pub mod inject;
pub mod navigation;
pub mod preferences;
pub mod probe;
pub mod session;
pub mod surface;
pub mod window_config;
pub mod zoom;

#[cfg(feature = "shell")]
mod host;

#[cfg(feature = "shell")]
pub use host::run;
