//! Initial window configuration computed from saved preferences.
//!
//! This is a pure function of its inputs: the preference store, the usable
//! area of the primary display and the platform the shell runs on. The host
//! turns the resulting [`WindowConfig`] into a real window once.

use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use serde::Serialize;
use serde_json::json;

use crate::event_bus::EventBus;
use crate::preferences::{
    PreferenceStore, KEY_HEIGHT, KEY_NATIVE_FRAME, KEY_WIDTH, KEY_X, KEY_Y,
};

pub const WINDOW_TITLE: &str = "Google Play Music Desktop Player";
pub const ICON_PATH: &str = "assets/img/main.png";
pub const PRELOAD_PATH: &str = "inject/generic.js";

/// Fraction of the display work area used when no size was saved.
const DEFAULT_SIZE_RATIO: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkArea {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            _ => Platform::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowConfig {
    pub title: String,
    pub width: f64,
    pub height: f64,
    /// `None` lets the host center the window.
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Always false here. The host shows the window once the page is ready.
    pub show: bool,
    pub frame: bool,
    pub icon: PathBuf,
    pub preload_script: PathBuf,
}

/// OS-version gated adjustments to the window configuration.
///
/// Both hooks are currently inert: they are matched so the gate stays
/// exercised, and `apply` leaves the configuration untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformHook {
    /// macOS with a Darwin kernel of 14.0.0 or later (Yosemite onward).
    /// Candidate for a framed window with an inset title bar.
    MacOsInsetTitleBar,
    /// Windows. Candidate for a notification bridge preload.
    WindowsNotifications,
}

impl PlatformHook {
    pub fn select(platform: Platform, os_release: Option<&Version>) -> Option<Self> {
        match platform {
            Platform::MacOs => {
                let release = os_release?;
                modern_darwin().matches(release).then_some(PlatformHook::MacOsInsetTitleBar)
            }
            Platform::Windows => Some(PlatformHook::WindowsNotifications),
            Platform::Linux | Platform::Other => None,
        }
    }

    pub fn apply(self, _config: &mut WindowConfig) {
        log::debug!("WINDOW: platform hook {self:?} selected (no changes)");
    }
}

fn modern_darwin() -> VersionReq {
    VersionReq {
        comparators: vec![semver::Comparator {
            op: semver::Op::GreaterEq,
            major: 14,
            minor: Some(0),
            patch: Some(0),
            pre: semver::Prerelease::EMPTY,
        }],
    }
}

/// Lenient parse of an OS release string such as `14.0.0`, `23.1` or
/// `6.18.44-fc-v139`. Only the leading numeric components are kept.
pub fn parse_os_release(raw: &str) -> Option<Version> {
    let numeric: Vec<u64> = raw
        .trim()
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()?
        .split('.')
        .filter(|part| !part.is_empty())
        .take(3)
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;
    match numeric.as_slice() {
        [] => None,
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch, ..] => Some(Version::new(*major, *minor, *patch)),
    }
}

/// Kernel release of the running OS (what `uname -r` prints).
pub fn detect_os_release() -> Option<Version> {
    if cfg!(unix) {
        let output = std::process::Command::new("uname").arg("-r").output().ok()?;
        parse_os_release(&String::from_utf8_lossy(&output.stdout))
    } else {
        None
    }
}

pub fn build(
    prefs: &dyn PreferenceStore,
    work_area: WorkArea,
    platform: Platform,
    os_release: Option<&Version>,
    resource_dir: &Path,
) -> WindowConfig {
    let width = prefs
        .get_f64(KEY_WIDTH)
        .unwrap_or(work_area.width * DEFAULT_SIZE_RATIO);
    let height = prefs
        .get_f64(KEY_HEIGHT)
        .unwrap_or(work_area.height * DEFAULT_SIZE_RATIO);

    let mut config = WindowConfig {
        title: WINDOW_TITLE.to_string(),
        width,
        height,
        x: prefs.get_f64(KEY_X),
        y: prefs.get_f64(KEY_Y),
        show: false,
        frame: prefs.get_bool(KEY_NATIVE_FRAME).unwrap_or(true),
        icon: resource_dir.join(ICON_PATH),
        preload_script: resource_dir.join(PRELOAD_PATH),
    };

    if let Some(hook) = PlatformHook::select(platform, os_release) {
        hook.apply(&mut config);
    }

    log::info!(
        "WINDOW: {}x{} at {:?},{:?} (frame: {})",
        config.width,
        config.height,
        config.x,
        config.y,
        config.frame
    );
    config
}

/// Where Windows parks a minimized window.
pub const MINIMIZED_POSITION: f64 = -32000.0;

/// Publish the window position so the next start reopens it there.
/// The parked position of a minimized window is not recorded.
pub fn record_position(bus: &EventBus, x: f64, y: f64) {
    if x <= MINIMIZED_POSITION && y <= MINIMIZED_POSITION {
        log::debug!("WINDOW: ignoring parked position ({x}, {y})");
        return;
    }
    bus.fire_setting(KEY_X, json!(x));
    bus.fire_setting(KEY_Y, json!(y));
}

/// A collapsed (zero-area) size is not recorded.
pub fn record_size(bus: &EventBus, width: f64, height: f64) {
    if width <= 0.0 || height <= 0.0 {
        log::debug!("WINDOW: ignoring collapsed size {width}x{height}");
        return;
    }
    bus.fire_setting(KEY_WIDTH, json!(width));
    bus.fire_setting(KEY_HEIGHT, json!(height));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::persist_settings;
    use crate::preferences::MemoryPreferences;
    use proptest::prelude::*;
    use std::sync::Arc;

    const AREA: WorkArea = WorkArea {
        width: 1920.0,
        height: 1040.0,
    };

    fn build_linux(prefs: &dyn PreferenceStore) -> WindowConfig {
        build(prefs, AREA, Platform::Linux, None, Path::new("/opt/gpm"))
    }

    #[test]
    fn empty_store_uses_three_quarters_of_work_area() {
        let config = build_linux(&MemoryPreferences::new());
        assert_eq!(config.width, 1440.0);
        assert_eq!(config.height, 780.0);
    }

    #[test]
    fn absent_position_is_left_unset() {
        let config = build_linux(&MemoryPreferences::new());
        assert_eq!(config.x, None);
        assert_eq!(config.y, None);
    }

    #[test]
    fn saved_geometry_is_used() {
        let prefs = MemoryPreferences::with_values([
            (KEY_WIDTH, json!(1000)),
            (KEY_HEIGHT, json!(640)),
            (KEY_X, json!(0)),
            (KEY_Y, json!(25)),
        ]);
        let config = build_linux(&prefs);
        assert_eq!((config.width, config.height), (1000.0, 640.0));
        assert_eq!((config.x, config.y), (Some(0.0), Some(25.0)));
    }

    #[test]
    fn window_starts_hidden_with_resources_resolved() {
        let config = build_linux(&MemoryPreferences::new());
        assert!(!config.show);
        assert!(config.frame);
        assert_eq!(config.title, WINDOW_TITLE);
        assert_eq!(config.icon, Path::new("/opt/gpm/assets/img/main.png"));
        assert_eq!(config.preload_script, Path::new("/opt/gpm/inject/generic.js"));
    }

    #[test]
    fn native_frame_preference_is_respected() {
        let prefs = MemoryPreferences::with_values([(KEY_NATIVE_FRAME, json!(false))]);
        assert!(!build_linux(&prefs).frame);
    }

    #[test]
    fn os_release_parsing_is_lenient() {
        assert_eq!(parse_os_release("14.0.0"), Some(Version::new(14, 0, 0)));
        assert_eq!(parse_os_release("23.1\n"), Some(Version::new(23, 1, 0)));
        assert_eq!(parse_os_release("6.18.44-fc-v139"), Some(Version::new(6, 18, 44)));
        assert_eq!(parse_os_release("10.0.19045.3448"), Some(Version::new(10, 0, 19045)));
        assert_eq!(parse_os_release("unknown"), None);
    }

    #[test]
    fn darwin_hook_is_gated_on_release() {
        let yosemite = Version::new(14, 0, 0);
        let mavericks = Version::new(13, 4, 0);
        assert_eq!(
            PlatformHook::select(Platform::MacOs, Some(&yosemite)),
            Some(PlatformHook::MacOsInsetTitleBar)
        );
        assert_eq!(PlatformHook::select(Platform::MacOs, Some(&mavericks)), None);
        assert_eq!(PlatformHook::select(Platform::MacOs, None), None);
        assert_eq!(
            PlatformHook::select(Platform::Windows, None),
            Some(PlatformHook::WindowsNotifications)
        );
        assert_eq!(PlatformHook::select(Platform::Linux, Some(&yosemite)), None);
    }

    #[test]
    fn platform_hooks_do_not_change_the_config() {
        let prefs = MemoryPreferences::new();
        let release = Version::new(23, 0, 0);
        let linux = build_linux(&prefs);
        let mac = build(&prefs, AREA, Platform::MacOs, Some(&release), Path::new("/opt/gpm"));
        let windows = build(&prefs, AREA, Platform::Windows, None, Path::new("/opt/gpm"));
        assert_eq!(linux, mac);
        assert_eq!(linux, windows);
    }

    #[test]
    fn recorded_geometry_feeds_the_next_build() {
        let bus = EventBus::new();
        let store = Arc::new(MemoryPreferences::new());
        persist_settings(&bus, store.clone());

        record_position(&bus, 40.0, 60.0);
        record_size(&bus, 900.0, 500.0);

        let config = build_linux(store.as_ref());
        assert_eq!((config.x, config.y), (Some(40.0), Some(60.0)));
        assert_eq!((config.width, config.height), (900.0, 500.0));
    }

    #[test]
    fn minimized_geometry_is_not_recorded() {
        let bus = EventBus::new();
        let store = Arc::new(MemoryPreferences::new());
        persist_settings(&bus, store.clone());

        record_position(&bus, 40.0, 60.0);
        record_size(&bus, 900.0, 500.0);
        record_position(&bus, MINIMIZED_POSITION, MINIMIZED_POSITION);
        record_size(&bus, 0.0, 0.0);

        let config = build_linux(store.as_ref());
        assert_eq!((config.x, config.y), (Some(40.0), Some(60.0)));
        assert_eq!((config.width, config.height), (900.0, 500.0));
    }

    proptest! {
        #[test]
        fn stored_size_wins_over_default(
            w in 200u32..8000,
            h in 200u32..8000,
            aw in 640.0f64..8000.0,
            ah in 480.0f64..8000.0,
        ) {
            let area = WorkArea { width: aw, height: ah };
            let prefs = MemoryPreferences::with_values([
                (KEY_WIDTH, json!(w)),
                (KEY_HEIGHT, json!(h)),
            ]);
            let config = build(&prefs, area, Platform::Linux, None, Path::new("."));
            prop_assert_eq!(config.width, w as f64);
            prop_assert_eq!(config.height, h as f64);

            let config = build(&MemoryPreferences::new(), area, Platform::Linux, None, Path::new("."));
            prop_assert_eq!(config.width, aw * 0.75);
            prop_assert_eq!(config.height, ah * 0.75);
        }
    }
}
