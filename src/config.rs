use std::path::PathBuf;

use log::{debug, info, warn};
use tauri::{AppHandle, Manager};
use tokio::fs;

use crate::hotkey;
use crate::models::{AppConfig, WindowConfig, CURRENT_CONFIG_VERSION};

const CONFIG_FILE_NAME: &str = "settings.json";

/// Check if debug mode is enabled via environment variable
fn is_debug_mode() -> bool {
    std::env::var("ARC_OVERLAY_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Check if URL is valid (https:// always, or http:// in debug mode)
fn is_valid_url(url: &str, allow_http: bool) -> bool {
    if url.starts_with("https://") {
        return true;
    }
    allow_http && url.starts_with("http://")
}

fn clamp_dimension(value: f64, fallback: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Clamp, trim, and sanitise every field so the rest of the app can trust it.
fn validate(mut cfg: AppConfig, allow_http: bool) -> AppConfig {
    let defaults = AppConfig::default();

    let api_url = cfg.api_url.trim().to_string();
    if api_url.is_empty() || !is_valid_url(&api_url, allow_http) {
        warn!("config: invalid api_url '{}', resetting to default", cfg.api_url);
        cfg.api_url = defaults.api_url.clone();
    } else {
        cfg.api_url = api_url;
    }

    cfg.mock_url = cfg.mock_url.and_then(|url| {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });

    // -- intervals: success refresh 1 min..24 h, failure retry 10 s..24 h --
    cfg.refresh_interval_seconds = cfg.refresh_interval_seconds.clamp(60, 86_400);
    cfg.retry_interval_seconds = cfg.retry_interval_seconds.clamp(10, 86_400);
    cfg.request_timeout_seconds = cfg.request_timeout_seconds.clamp(1, 120);

    let hotkey_name = cfg.toggle_hotkey.trim().to_string();
    if hotkey::parse_hotkey(&hotkey_name).is_err() {
        warn!(
            "config: invalid toggle_hotkey '{}', resetting to {}",
            cfg.toggle_hotkey, defaults.toggle_hotkey
        );
        cfg.toggle_hotkey = defaults.toggle_hotkey.clone();
    } else {
        cfg.toggle_hotkey = hotkey_name;
    }

    let window_defaults = WindowConfig::default();
    cfg.window = WindowConfig {
        width: clamp_dimension(cfg.window.width, window_defaults.width, 100.0, 4_000.0),
        height: clamp_dimension(cfg.window.height, window_defaults.height, 20.0, 400.0),
        offset_right: clamp_dimension(
            cfg.window.offset_right,
            window_defaults.offset_right,
            0.0,
            4_000.0,
        ),
        offset_bottom: clamp_dimension(
            cfg.window.offset_bottom,
            window_defaults.offset_bottom,
            0.0,
            4_000.0,
        ),
    };

    // stamp current version
    cfg.config_version = CURRENT_CONFIG_VERSION;
    cfg
}

pub fn config_path(app: &AppHandle) -> Result<PathBuf, String> {
    let mut base = app
        .path()
        .app_config_dir()
        .map_err(|err| format!("failed to resolve app config dir: {err}"))?;
    base.push(CONFIG_FILE_NAME);
    Ok(base)
}

pub async fn load_config(app: &AppHandle) -> Result<AppConfig, String> {
    let path = config_path(app)?;
    let allow_http = is_debug_mode();

    let loaded = if path.exists() {
        debug!("loading config from {}", path.display());
        let content = fs::read_to_string(&path)
            .await
            .map_err(|err| format!("failed to read config: {err}"))?;
        serde_json::from_str::<AppConfig>(&content)
            .map_err(|err| format!("invalid config JSON: {err}"))?
    } else {
        info!("no config file at {}, writing defaults", path.display());
        AppConfig::default()
    };

    let validated = validate(loaded, allow_http);

    // always persist after load so the file reflects the latest schema
    let serialized = serde_json::to_string_pretty(&validated)
        .map_err(|err| format!("failed to serialize config: {err}"))?;
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent).await;
    }
    if let Err(err) = fs::write(&path, serialized).await {
        warn!("failed to write config back to {}: {}", path.display(), err);
    }

    Ok(validated)
}
