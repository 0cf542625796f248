//! Global view-toggle hotkey, registered through the global-shortcut plugin so it fires
//! while the game has focus.

use log::{debug, info, warn};
use tauri::plugin::TauriPlugin;
use tauri::{AppHandle, Wry};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

/// Converts a hotkey name (e.g. `"F12"`, `"Ctrl+Shift+O"`) into a shortcut.
pub fn parse_hotkey(name: &str) -> Result<Shortcut, String> {
    name.trim()
        .parse::<Shortcut>()
        .map_err(|err| format!("invalid hotkey '{name}': {err}"))
}

/// Plugin whose handler toggles the view on key press. Release events are ignored.
pub fn plugin() -> TauriPlugin<Wry> {
    tauri_plugin_global_shortcut::Builder::new()
        .with_handler(|app, shortcut, event| {
            if event.state() != ShortcutState::Pressed {
                return;
            }
            debug!("hotkey {:?} pressed", shortcut);
            let app_handle = app.clone();
            tauri::async_runtime::spawn(async move {
                if let Err(err) = crate::toggle_view_internal(app_handle).await {
                    warn!("hotkey toggle failed: {}", err);
                }
            });
        })
        .build()
}

pub fn register(app: &AppHandle, name: &str) -> Result<(), String> {
    let shortcut = parse_hotkey(name)?;
    app.global_shortcut()
        .register(shortcut)
        .map_err(|err| format!("failed to register hotkey '{name}': {err}"))?;
    info!("toggle hotkey registered: {}", name);
    Ok(())
}

pub fn unregister_all(app: &AppHandle) -> Result<(), String> {
    app.global_shortcut()
        .unregister_all()
        .map_err(|err| format!("failed to unregister hotkeys: {err}"))?;
    info!("hotkeys unregistered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys_and_combinations_parse() {
        assert!(parse_hotkey("F12").is_ok());
        assert!(parse_hotkey(" f8 ").is_ok());
        assert!(parse_hotkey("Ctrl+Shift+O").is_ok());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(parse_hotkey("").is_err());
        assert!(parse_hotkey("Hyperdrive").is_err());
    }
}
