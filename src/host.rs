use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tauri::webview::PageLoadEvent;
use tauri::{Emitter, Manager, State, WebviewUrl, WebviewWindow, WindowEvent};
use tauri_plugin_opener::OpenerExt;

use crate::config::ShellConfig;
use crate::dom_patch::PatchPlan;
use crate::event_bus::{persist_settings, EventBus, WINDOW_SETTINGS};
use crate::inject::{self, InjectionConfig};
use crate::navigation::{NavigationGuard, PageReport};
use crate::preferences::{MemoryPreferences, PreferenceStore, SqlitePreferences};
use crate::probe::{reporting_script, ProbeRegistry};
use crate::session::{KeyOutcome, ShellSession};
use crate::surface::{ContentSurface, Evaluation, KeyEvent};
use crate::window_config::{self, Platform, WorkArea};

pub const MAIN_WINDOW: &str = "main";

const DEFAULT_ICON: &[u8] = include_bytes!("../assets/img/main.png");
const FALLBACK_WORK_AREA: WorkArea = WorkArea {
    width: 1280.0,
    height: 800.0,
};

// Application state shared by the IPC commands and window callbacks
pub struct AppState {
    config: ShellConfig,
    prefs: Arc<dyn PreferenceStore>,
    bus: Arc<EventBus>,
    probes: Arc<ProbeRegistry>,
    session: Mutex<Option<Arc<ShellSession>>>,
    /// Navigation reports received before the session existed.
    early: Mutex<PageReport>,
}

impl AppState {
    fn session(&self) -> Result<Arc<ShellSession>, String> {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| "page not ready".to_string())
    }

    /// Hands a navigation report to the guard, or keeps it for the session
    /// `on_page_loaded` is about to create.
    fn observe(&self, apply: impl FnOnce(&NavigationGuard), keep: impl FnOnce(&mut PageReport)) {
        let slot = self.session.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(session) => apply(&session.navigation()),
            None => keep(&mut self.early.lock().unwrap_or_else(|e| e.into_inner())),
        }
    }
}

/// The player webview as a [`ContentSurface`].
struct WebviewSurface {
    window: WebviewWindow,
    probes: Arc<ProbeRegistry>,
}

impl WebviewSurface {
    fn eval(&self, js: &str) -> bool {
        match self.window.eval(js) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("HOST: eval failed: {e}");
                false
            }
        }
    }
}

impl ContentSurface for WebviewSurface {
    fn set_zoom_factor(&self, factor: f64) {
        if let Err(e) = self.window.set_zoom(factor) {
            log::warn!("HOST: could not set zoom {factor}: {e}");
        }
    }

    fn set_back_opacity(&self, opacity: f64) {
        self.eval(&inject::set_back_opacity_script(opacity));
    }

    fn history_back(&self) {
        self.eval(inject::HISTORY_BACK_SCRIPT);
    }

    fn navigate_to(&self, url: &str) {
        self.eval(&inject::navigate_script(url));
    }

    fn execute(&self, script: &str) -> Evaluation {
        let (id, result) = self.probes.register();
        if !self.eval(&reporting_script(id, script)) {
            self.probes.forget(id);
        }
        Evaluation { id, result }
    }

    fn abandon(&self, id: u64) {
        self.probes.forget(id);
    }

    fn detach(&self) {
        self.eval(inject::TEARDOWN_SCRIPT);
        self.probes.cancel_all();
    }
}

#[tauri::command]
fn nav_location_changed(href: String, state: State<'_, AppState>) {
    state.observe(
        |nav| nav.on_popstate(&href),
        |early| early.location = Some(href.clone()),
    );
}

#[tauri::command]
fn nav_search_changed(query: String, state: State<'_, AppState>) {
    state.observe(
        |nav| nav.on_search_input(&query),
        |early| early.search_query = Some(query.clone()),
    );
}

#[tauri::command]
async fn nav_back_requested(state: State<'_, AppState>) -> Result<(), String> {
    let nav = state.session()?.navigation();
    let outcome = nav.attempt_back().await;
    log::debug!("NAV: back button -> {outcome:?}");
    Ok(())
}

#[tauri::command]
async fn page_key_up(event: KeyEvent, state: State<'_, AppState>) -> Result<(), String> {
    let session = state.session()?;
    match session.handle_key(&event).await {
        KeyOutcome::Ignored => {}
        outcome => log::debug!("HOST: key {:?} -> {outcome:?}", event.key),
    }
    Ok(())
}

#[tauri::command]
fn probe_resolve(id: u64, value: Value, state: State<'_, AppState>) {
    state.probes.resolve(id, value);
}

#[tauri::command]
fn open_external(url: String, app: tauri::AppHandle) -> Result<(), String> {
    log::info!("HOST: opening {url} in the system browser");
    app.opener()
        .open_url(url, None::<&str>)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn open_desktop_settings(state: State<'_, AppState>) {
    state.bus.fire(WINDOW_SETTINGS, None);
}

fn open_preferences(data_dir: &Path) -> Arc<dyn PreferenceStore> {
    match SqlitePreferences::new(data_dir.join("preferences.db")) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("PREFS: database unavailable, settings will not persist: {e}");
            Arc::new(MemoryPreferences::new())
        }
    }
}

fn primary_work_area(app: &tauri::App) -> WorkArea {
    match app.primary_monitor() {
        Ok(Some(monitor)) => {
            let size = monitor.work_area().size.to_logical::<f64>(monitor.scale_factor());
            WorkArea {
                width: size.width,
                height: size.height,
            }
        }
        Ok(None) => FALLBACK_WORK_AREA,
        Err(e) => {
            log::warn!("WINDOW: no primary monitor info: {e}");
            FALLBACK_WORK_AREA
        }
    }
}

fn on_page_loaded(window: &WebviewWindow) {
    let state = window.state::<AppState>();
    let mut slot = state.session.lock().unwrap_or_else(|e| e.into_inner());
    match slot.as_ref() {
        Some(session) => session.zoom().reapply(),
        None => {
            let surface = Arc::new(WebviewSurface {
                window: window.clone(),
                probes: Arc::clone(&state.probes),
            });
            let session = ShellSession::start(
                &state.config,
                state.prefs.as_ref(),
                Arc::clone(&state.bus),
                surface,
            );
            let app = window.app_handle().clone();
            session.subscribe(WINDOW_SETTINGS, move |_| {
                log::info!("HOST: desktop settings requested");
                if let Err(e) = app.emit(WINDOW_SETTINGS, ()) {
                    log::warn!("HOST: could not forward settings request: {e}");
                }
            });
            let early = std::mem::take(&mut *state.early.lock().unwrap_or_else(|e| e.into_inner()));
            session.navigation().replay(early);
            *slot = Some(Arc::new(session));
        }
    }
    if let Err(e) = window.show() {
        log::warn!("HOST: could not show window: {e}");
    }
}

fn track_window(window: &WebviewWindow) {
    let handle = window.clone();
    window.on_window_event(move |event| {
        let state = handle.state::<AppState>();
        match event {
            // Minimized windows report an off-screen position and a zero size.
            WindowEvent::Moved(_) | WindowEvent::Resized(_)
                if handle.is_minimized().unwrap_or(false) => {}
            WindowEvent::Moved(pos) => {
                let scale = handle.scale_factor().unwrap_or(1.0);
                let pos = pos.to_logical::<f64>(scale);
                window_config::record_position(&state.bus, pos.x, pos.y);
            }
            WindowEvent::Resized(size) => {
                let scale = handle.scale_factor().unwrap_or(1.0);
                let size = size.to_logical::<f64>(scale);
                window_config::record_size(&state.bus, size.width, size.height);
            }
            WindowEvent::CloseRequested { .. } | WindowEvent::Destroyed => {
                let session = state
                    .session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take();
                if let Some(session) = session {
                    session.teardown();
                }
            }
            _ => {}
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dotenvy::dotenv() {
        log::debug!("HOST: no .env loaded: {e}");
    }

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let config = ShellConfig::from_env().unwrap_or_else(|e| {
                log::warn!("HOST: ignoring environment overrides: {e}");
                ShellConfig::default()
            });

            let data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&data_dir)?;
            let prefs = open_preferences(&data_dir);

            let bus = Arc::new(EventBus::new());
            persist_settings(&bus, Arc::clone(&prefs));

            let os_release = window_config::detect_os_release();
            let initial = window_config::build(
                prefs.as_ref(),
                primary_work_area(app),
                Platform::current(),
                os_release.as_ref(),
                &data_dir,
            );

            let plan = PatchPlan::player_defaults(config.menu_poll_interval);
            let preload = inject::write_preload(
                &initial.preload_script,
                &InjectionConfig {
                    home_url: &config.home_url,
                    plan: &plan,
                },
            )?;
            let init_script = std::fs::read_to_string(preload)?;

            app.manage(AppState {
                config: config.clone(),
                prefs,
                bus,
                probes: Arc::new(ProbeRegistry::new()),
                session: Mutex::new(None),
                early: Mutex::new(PageReport::default()),
            });

            let icon = if initial.icon.exists() {
                tauri::image::Image::from_path(&initial.icon)?
            } else {
                tauri::image::Image::from_bytes(DEFAULT_ICON)?
            };

            let mut builder = tauri::WebviewWindowBuilder::new(
                app,
                MAIN_WINDOW,
                WebviewUrl::External(config.app_url.parse()?),
            )
            .title(&initial.title)
            .inner_size(initial.width, initial.height)
            .visible(initial.show)
            .decorations(initial.frame)
            .icon(icon)?
            .initialization_script(&init_script)
            .on_page_load(|window, payload| {
                if matches!(payload.event(), PageLoadEvent::Finished) {
                    on_page_loaded(&window);
                }
            });
            builder = match (initial.x, initial.y) {
                (Some(x), Some(y)) => builder.position(x, y),
                _ => builder.center(),
            };

            let window = builder.build()?;
            track_window(&window);
            log::info!("HOST: player window created for {}", config.app_url);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            nav_location_changed,
            nav_search_changed,
            nav_back_requested,
            page_key_up,
            probe_resolve,
            open_external,
            open_desktop_settings
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
