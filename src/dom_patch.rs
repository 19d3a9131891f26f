//! Declarative page patches applied by the preload script once the player
//! has rendered: hide controls that cannot work in the desktop shell,
//! restyle what remains, and reroute a few buttons.
//!
//! The operations are plain data. They are serialized into the preload and
//! interpreted by a small in-page runtime (see [`crate::inject`]).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

pub const SHOP_URL: &str = "https://play.google.com/store/music?feature=music_general";
pub const SUBSCRIBE_URL: &str = "https://play.google.com/music/listen#/sulp";

pub const BACK_BUTTON_ID: &str = "backButton";

/// Tried in order; the first match wins.
pub const SEARCH_BOX_SELECTORS: &[&str] = &["#material-one-middle > sj-search-box", "#material-one-middle"];
pub const SEARCH_INPUT_SELECTORS: &[&str] = &["sj-search-box input", "#material-one-middle > input"];
pub const NAV_SECTION_SELECTORS: &[&str] = &[".nav-section.material", "#nav_collections"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PatchOp {
    /// `display: none` on every match, optionally removing it from the DOM.
    Hide { selector: String, remove: bool },
    Style {
        selector: String,
        properties: BTreeMap<String, String>,
    },
    /// Appends a `<style>` element with the given rules.
    CssRule { css: String },
    /// Clicking opens `url` in the system browser instead of the page.
    /// `undo_navigation` steps the page back afterwards.
    Redirect {
        selector: String,
        url: String,
        undo_navigation: bool,
    },
    /// Re-applies a hide on a timer, for an element that is recreated
    /// without any event to hook.
    PollHide { selector: String },
}

impl PatchOp {
    pub fn hide(selector: &str) -> Self {
        PatchOp::Hide {
            selector: selector.to_string(),
            remove: false,
        }
    }

    pub fn remove(selector: &str) -> Self {
        PatchOp::Hide {
            selector: selector.to_string(),
            remove: true,
        }
    }

    pub fn style(selector: &str, properties: &[(&str, &str)]) -> Self {
        PatchOp::Style {
            selector: selector.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn css(css: &str) -> Self {
        PatchOp::CssRule {
            css: css.to_string(),
        }
    }

    pub fn redirect(selector: &str, url: &str, undo_navigation: bool) -> Self {
        PatchOp::Redirect {
            selector: selector.to_string(),
            url: url.to_string(),
            undo_navigation,
        }
    }
}

/// The "Desktop settings" entry added to the left navigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsEntry {
    pub label: String,
    pub section_selectors: Vec<String>,
    /// Index among the section's links to insert before; appended when absent.
    pub insert_before_index: usize,
}

/// Styling and lookup rules of the back button.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackButtonSpec {
    pub id: String,
    pub search_box_selectors: Vec<String>,
    pub search_input_selectors: Vec<String>,
    pub style: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPlan {
    pub ops: Vec<PatchOp>,
    pub poll_interval_ms: u64,
    pub settings_entry: SettingsEntry,
    pub back_button: BackButtonSpec,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PatchPlan {
    pub fn player_defaults(poll_interval: Duration) -> Self {
        let ops = vec![
            // Account switcher buttons, keep only the avatar.
            PatchOp::hide("#material-one-right #gb > div > div > div:not(:last-child)"),
            PatchOp::style(
                "#material-one-right #gb > div > div > div:last-child",
                &[("display", "block"), ("float", "right")],
            ),
            PatchOp::style(
                "#material-one-right #gb > div > div",
                &[("display", "block"), ("float", "right")],
            ),
            // Built-in mini player.
            PatchOp::hide(".player-top-right-items > paper-icon-button"),
            PatchOp::hide("[data-action=\"upload-music\"]"),
            PatchOp::hide("[data-action=\"help-and-feedback\"]"),
            PatchOp::hide("[data-action=\"send-gift\"]"),
            PatchOp::css(".music-sources-card.settings-card {display: none !important}"),
            PatchOp::remove(".upload-dialog-bg"),
            PatchOp::remove(".upload-dialog"),
            PatchOp::PollHide {
                selector: ".goog-menu.now-playing-menu > .goog-menuitem:nth-child(3)".to_string(),
            },
            PatchOp::redirect("[data-type=\"shop\"]", SHOP_URL, false),
            PatchOp::redirect(".sub[data-type=\"sub\"]", SUBSCRIBE_URL, true),
            // Keep the clear-search button above the back arrow.
            PatchOp::style("sj-search-box #clearButton", &[("z-index", "10")]),
            // Redundant with the event-driven sync: never show back while a query is typed.
            PatchOp::css(&format!(
                "sj-search-box[has-query] #{BACK_BUTTON_ID} {{opacity: 0 !important}}"
            )),
        ];

        let back_style = [
            ("position", "absolute"),
            ("right", "3px"),
            ("top", "1px"),
            ("width", "46px"),
            ("height", "46px"),
            ("opacity", "0"),
            ("transition", "opacity 0.2s ease-in-out"),
        ];

        PatchPlan {
            ops,
            poll_interval_ms: poll_interval.as_millis() as u64,
            settings_entry: SettingsEntry {
                label: "Desktop settings".to_string(),
                section_selectors: strings(NAV_SECTION_SELECTORS),
                insert_before_index: 2,
            },
            back_button: BackButtonSpec {
                id: BACK_BUTTON_ID.to_string(),
                search_box_selectors: strings(SEARCH_BOX_SELECTORS),
                search_input_selectors: strings(SEARCH_INPUT_SELECTORS),
                style: back_style
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }
}
