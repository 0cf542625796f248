use log::{debug, info};
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Manager, Wry};

use crate::models::DisplayState;

pub const TRAY_ID: &str = "overlay_tray";
const IDLE_TOOLTIP: &str = "Arc Overlay";

fn build_tray_menu(app: &AppHandle) -> Result<Menu<Wry>, String> {
    let toggle = MenuItem::with_id(app, "toggle_view", "Toggle View", true, None::<&str>)
        .map_err(|err| format!("failed to create Toggle View menu item: {err}"))?;
    let refresh = MenuItem::with_id(app, "refresh_schedule", "Refresh Schedule", true, None::<&str>)
        .map_err(|err| format!("failed to create Refresh Schedule menu item: {err}"))?;
    let sep = PredefinedMenuItem::separator(app)
        .map_err(|err| format!("failed to create separator: {err}"))?;
    let quit = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)
        .map_err(|err| format!("failed to create Quit menu item: {err}"))?;

    let menu = Menu::with_items(app, &[&toggle, &refresh, &sep, &quit])
        .map_err(|err| format!("failed to create tray menu: {err}"))?;
    Ok(menu)
}

pub fn setup_tray(app: &AppHandle) -> Result<(), String> {
    let menu = build_tray_menu(app)?;

    let default_icon = app
        .default_window_icon()
        .cloned()
        .ok_or_else(|| "default icon is missing".to_string())?;

    TrayIconBuilder::with_id(TRAY_ID)
        .icon(default_icon)
        .tooltip(IDLE_TOOLTIP)
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(|app, event| {
            let app_handle = app.clone();
            match event.id().as_ref() {
                "toggle_view" => {
                    info!("tray menu: toggle view");
                    tauri::async_runtime::spawn(async move {
                        let _ = crate::toggle_view_internal(app_handle).await;
                    });
                }
                "refresh_schedule" => {
                    info!("tray menu: refresh schedule");
                    tauri::async_runtime::spawn(async move {
                        let _ = crate::refresh_schedule_internal(app_handle).await;
                    });
                }
                "quit" => {
                    info!("tray menu: quit");
                    tauri::async_runtime::spawn(async move {
                        crate::shutdown_internal(app_handle).await;
                    });
                }
                _ => {}
            }
        })
        .on_tray_icon_event(|tray, event| {
            if matches!(
                event,
                TrayIconEvent::Click {
                    button: MouseButton::Left,
                    button_state: MouseButtonState::Up,
                    ..
                }
            ) {
                let app_handle = tray.app_handle().clone();
                tauri::async_runtime::spawn(async move {
                    let _ = crate::toggle_view_internal(app_handle).await;
                });
            }
        })
        .build(app)
        .map_err(|err| format!("failed to build tray icon: {err}"))?;

    info!("system tray initialized");
    Ok(())
}

pub fn tooltip_text(state: &DisplayState) -> String {
    if state.header.is_empty() && state.content.is_empty() {
        return IDLE_TOOLTIP.to_string();
    }
    format!("{}: {}", state.header, state.content)
}

pub fn refresh_tray(app: &AppHandle, state: &DisplayState) -> Result<(), String> {
    let tray = app
        .tray_by_id(TRAY_ID)
        .ok_or_else(|| "tray icon not initialized".to_string())?;

    let tooltip = tooltip_text(state);
    debug!("tray tooltip: {}", tooltip);

    tray.set_tooltip(Some(&tooltip))
        .map_err(|err| format!("failed to set tray tooltip: {err}"))?;

    Ok(())
}
