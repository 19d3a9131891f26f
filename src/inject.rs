//! The preload script handed to the player window.
//!
//! It carries the serialized [`PatchPlan`] plus a small runtime that applies
//! it, builds the back button and reports page events to the shell over IPC.
//! All decisions (back visibility, back behavior, zoom) are made on the Rust
//! side; the page only reports and obeys.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dom_patch::PatchPlan;
use crate::error::ShellResult;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionConfig<'a> {
    pub home_url: &'a str,
    pub plan: &'a PatchPlan,
}

pub fn build_init_script(config: &InjectionConfig<'_>) -> serde_json::Result<String> {
    let json = serde_json::to_string(config)?;
    Ok(format!("window.__GPM_SHELL_CONFIG__ = {json};\n{RUNTIME}"))
}

/// Writes the preload where the window configuration expects it.
pub fn write_preload(path: &Path, config: &InjectionConfig<'_>) -> ShellResult<PathBuf> {
    let script = build_init_script(config).map_err(std::io::Error::other)?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, script)?;
    log::info!("INJECT: preload written to {}", path.display());
    Ok(path.to_path_buf())
}

/// Script that undoes the runtime's listeners and timers.
pub const TEARDOWN_SCRIPT: &str = "if (window.__gpmShell) { window.__gpmShell.teardown(); }";

pub fn set_back_opacity_script(opacity: f64) -> String {
    format!("if (window.__gpmShell) {{ window.__gpmShell.setBackOpacity({opacity}); }}")
}

pub fn navigate_script(url: &str) -> String {
    // JSON string literals are valid JS string literals.
    let quoted = serde_json::Value::String(url.to_string());
    format!("window.location.href = {quoted};")
}

pub const HISTORY_BACK_SCRIPT: &str = "window.history.back()";

const RUNTIME: &str = r#"
(function() {
    if (window.__gpmShell) return;
    const CONFIG = window.__GPM_SHELL_CONFIG__;
    const PLAN = CONFIG.plan;
    const listeners = [];
    const timers = [];

    const invoke = (cmd, args) => {
        const t = window.__TAURI__;
        const fn = (t && t.core && t.core.invoke) || (window.__TAURI_INTERNALS__ && window.__TAURI_INTERNALS__.invoke);
        if (!fn) {
            console.warn('GPM-SHELL: IPC unavailable, dropped', cmd);
            return Promise.resolve();
        }
        return fn(cmd, args || {}).catch(err => console.error('GPM-SHELL:', cmd, 'failed:', err));
    };

    const listen = (target, type, handler, options) => {
        target.addEventListener(type, handler, options);
        listeners.push(() => target.removeEventListener(type, handler, options));
    };

    const firstMatch = (selectors) => {
        for (const selector of selectors) {
            const el = document.querySelector(selector);
            if (el) return el;
        }
        return null;
    };

    const hide = (selector, remove) => {
        document.querySelectorAll(selector).forEach(el => {
            el.style.display = 'none';
            if (remove) el.remove();
        });
    };

    const style = (selector, properties) => {
        document.querySelectorAll(selector).forEach(el => {
            Object.keys(properties).forEach(key => el.style.setProperty(key, properties[key]));
        });
    };

    const cssRule = (css) => {
        const tag = document.createElement('style');
        tag.type = 'text/css';
        tag.appendChild(document.createTextNode(css));
        document.head.appendChild(tag);
    };

    const redirect = (selector, url, undoNavigation) => {
        const button = document.querySelector(selector);
        if (!button) {
            console.warn('GPM-SHELL: redirect target missing:', selector);
            return;
        }
        listen(button, 'click', (e) => {
            invoke('open_external', { url });
            if (undoNavigation) setTimeout(() => history.back(), 0);
            e.preventDefault();
            return false;
        });
    };

    const applyPlan = () => {
        PLAN.ops.forEach(op => {
            switch (op.op) {
                case 'hide': hide(op.selector, op.remove); break;
                case 'style': style(op.selector, op.properties); break;
                case 'cssRule': cssRule(op.css); break;
                case 'redirect': redirect(op.selector, op.url, op.undoNavigation); break;
                case 'pollHide':
                    timers.push(setInterval(() => hide(op.selector, false), PLAN.pollIntervalMs));
                    break;
                default: console.warn('GPM-SHELL: unknown patch op', op.op);
            }
        });
    };

    const installSettingsEntry = () => {
        const entry = PLAN.settingsEntry;
        const section = firstMatch(entry.sectionSelectors);
        if (!section) {
            console.warn('GPM-SHELL: navigation section missing, settings entry skipped');
            return;
        }
        const link = document.createElement('a');
        link.setAttribute('data-type', 'desktopsettings');
        link.setAttribute('class', 'nav-item-container tooltip');
        link.setAttribute('href', '');
        link.setAttribute('no-focus', '');
        const icon = document.createElement('iron-icon');
        icon.setAttribute('icon', 'settings');
        icon.setAttribute('class', 'x-scope iron-icon-1');
        link.appendChild(icon);
        link.appendChild(document.createTextNode(entry.label));
        listen(link, 'click', (e) => {
            invoke('open_desktop_settings');
            e.preventDefault();
            e.stopPropagation();
            return false;
        });
        const anchors = section.querySelectorAll(':scope > a');
        section.insertBefore(link, anchors[entry.insertBeforeIndex] || null);
    };

    let backButton = null;

    const installBackButton = () => {
        const spec = PLAN.backButton;
        const searchBox = firstMatch(spec.searchBoxSelectors);
        const searchInput = firstMatch(spec.searchInputSelectors);
        if (!searchBox || !searchInput) {
            console.warn('GPM-SHELL: search box missing, back button skipped');
            return;
        }
        backButton = document.createElement('paper-icon-button');
        backButton.setAttribute('icon', 'arrow-back');
        backButton.setAttribute('id', spec.id);
        backButton.setAttribute('class', 'x-scope paper-icon-button-0');
        Object.keys(spec.style).forEach(key => backButton.style.setProperty(key, spec.style[key]));
        searchBox.insertBefore(backButton, null);

        listen(backButton, 'click', () => invoke('nav_back_requested'));
        listen(window, 'popstate', () => invoke('nav_location_changed', { href: location.href }));
        listen(searchInput, 'input', () => invoke('nav_search_changed', { query: searchInput.value }));

        invoke('nav_search_changed', { query: searchInput.value });
        invoke('nav_location_changed', { href: location.href });
    };

    const installKeys = () => {
        listen(window, 'keyup', (e) => {
            const active = document.activeElement;
            invoke('page_key_up', {
                event: {
                    key: e.key,
                    ctrl: e.ctrlKey,
                    editableFocus: !!active && active.value !== undefined,
                },
            });
        });
    };

    window.__gpmShell = {
        setBackOpacity: (opacity) => {
            if (backButton) backButton.style.opacity = String(opacity);
        },
        teardown: () => {
            listeners.splice(0).forEach(off => off());
            timers.splice(0).forEach(id => clearInterval(id));
        },
    };

    // The player renders lazily; wait for its search box before patching.
    const whenReady = (fn, tries) => {
        if (firstMatch(PLAN.backButton.searchBoxSelectors) || tries <= 0) {
            fn();
        } else {
            setTimeout(() => whenReady(fn, tries - 1), 100);
        }
    };

    const start = () => whenReady(() => {
        applyPlan();
        installSettingsEntry();
        installBackButton();
        installKeys();
        console.log('GPM-SHELL: page customizations installed');
    }, 300);

    if (document.readyState === 'loading') {
        document.addEventListener('DOMContentLoaded', start, { once: true });
    } else {
        start();
    }
})();
"#;
