use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tauri::{AppHandle, Emitter, LogicalPosition, WebviewUrl, WebviewWindow, WebviewWindowBuilder};
use tokio::sync::RwLock;

use crate::models::{DisplayState, WindowConfig};
use crate::scheduler::DisplaySurface;
use crate::tray;

pub const OVERLAY_LABEL: &str = "overlay";
pub const DISPLAY_EVENT: &str = "display-updated";

/// Top-left corner of the overlay, relative to the monitor origin, in logical pixels.
pub fn overlay_origin(screen_width: f64, screen_height: f64, cfg: &WindowConfig) -> (f64, f64) {
    let x = screen_width - cfg.width - cfg.offset_right;
    let y = screen_height - cfg.height - cfg.offset_bottom;
    (x.max(0.0), y.max(0.0))
}

/// Creates the borderless, transparent, click-through overlay window.
pub fn create_overlay_window(app: &AppHandle, cfg: &WindowConfig) -> Result<WebviewWindow, String> {
    let window = WebviewWindowBuilder::new(app, OVERLAY_LABEL, WebviewUrl::App("index.html".into()))
        .title("Arc Overlay")
        .inner_size(cfg.width, cfg.height)
        .decorations(false)
        .transparent(true)
        .shadow(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .resizable(false)
        .focused(false)
        .visible(false)
        .build()
        .map_err(|err| format!("failed to create overlay window: {err}"))?;

    window
        .set_ignore_cursor_events(true)
        .map_err(|err| format!("failed to make overlay click-through: {err}"))?;

    position_overlay(&window, cfg)?;

    window
        .show()
        .map_err(|err| format!("failed to show overlay window: {err}"))?;

    info!("overlay window created ({}x{})", cfg.width, cfg.height);
    Ok(window)
}

fn position_overlay(window: &WebviewWindow, cfg: &WindowConfig) -> Result<(), String> {
    let monitor = window
        .primary_monitor()
        .map_err(|err| format!("failed to query primary monitor: {err}"))?;

    let Some(monitor) = monitor else {
        warn!("no primary monitor reported, leaving overlay at default position");
        return Ok(());
    };

    let scale = monitor.scale_factor();
    let size = monitor.size().to_logical::<f64>(scale);
    let origin = monitor.position().to_logical::<f64>(scale);
    let (x, y) = overlay_origin(size.width, size.height, cfg);

    debug!(
        "placing overlay at ({}, {}) on {}x{} monitor",
        origin.x + x,
        origin.y + y,
        size.width,
        size.height
    );

    window
        .set_position(LogicalPosition::new(origin.x + x, origin.y + y))
        .map_err(|err| format!("failed to position overlay window: {err}"))
}

/// Pushes rendered states to the webview and the tray tooltip.
pub struct OverlaySurface {
    app: AppHandle,
    latest: Arc<RwLock<DisplayState>>,
}

impl OverlaySurface {
    pub fn new(app: AppHandle, latest: Arc<RwLock<DisplayState>>) -> Self {
        Self { app, latest }
    }
}

#[async_trait]
impl DisplaySurface for OverlaySurface {
    async fn render(&self, state: DisplayState) -> Result<(), String> {
        {
            let mut latest = self.latest.write().await;
            *latest = state.clone();
        }

        if let Err(err) = tray::refresh_tray(&self.app, &state) {
            debug!("tray not refreshed: {}", err);
        }

        self.app
            .emit_to(OVERLAY_LABEL, DISPLAY_EVENT, state)
            .map_err(|err| format!("failed to emit display update: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_to_bottom_right_with_offsets() {
        let cfg = WindowConfig::default();
        assert_eq!(overlay_origin(1920.0, 1080.0, &cfg), (995.0, 1036.0));
    }

    #[test]
    fn never_leaves_the_screen_origin() {
        let cfg = WindowConfig {
            width: 900.0,
            ..WindowConfig::default()
        };
        assert_eq!(overlay_origin(800.0, 30.0, &cfg), (0.0, 0.0));
    }
}
