use serde_json::Value;
use tokio::sync::oneshot;

/// The rendered page, as seen from the shell.
///
/// Everything here is fire-and-forget except [`ContentSurface::execute`],
/// whose result arrives later through the returned [`Evaluation`]. A dropped
/// sender means the page went away before answering.
pub trait ContentSurface: Send + Sync {
    fn set_zoom_factor(&self, factor: f64);

    fn set_back_opacity(&self, opacity: f64);

    /// Pop one entry of the page's own history.
    fn history_back(&self);

    fn navigate_to(&self, url: &str);

    /// Evaluate `script` inside the page and deliver its value.
    fn execute(&self, script: &str) -> Evaluation;

    /// Stop waiting for evaluation `id`. A late answer is discarded.
    fn abandon(&self, _id: u64) {}

    /// Remove the page-side listeners and timers installed by the preload.
    fn detach(&self) {}
}

/// A pending [`ContentSurface::execute`].
#[derive(Debug)]
pub struct Evaluation {
    pub id: u64,
    pub result: oneshot::Receiver<Value>,
}

/// A `keyup` reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    /// DOM `KeyboardEvent.key`.
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    /// Whether an input-like element had focus when the key was released.
    #[serde(default)]
    pub editable_focus: bool,
}

impl KeyEvent {
    pub fn plain(key: &str) -> Self {
        KeyEvent {
            key: key.to_string(),
            ctrl: false,
            editable_focus: false,
        }
    }

    pub fn with_ctrl(key: &str) -> Self {
        KeyEvent {
            ctrl: true,
            ..Self::plain(key)
        }
    }
}
