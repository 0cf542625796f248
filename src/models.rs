use serde::{Deserialize, Serialize};

pub const CURRENT_CONFIG_VERSION: u32 = 1;

fn default_api_url() -> String {
    "https://metaforge.app/api/arc-raiders/events-schedule".to_string()
}

fn default_refresh_interval_seconds() -> u64 {
    3_600
}

fn default_retry_interval_seconds() -> u64 {
    300
}

fn default_request_timeout_seconds() -> u64 {
    15
}

fn default_toggle_hotkey() -> String {
    "F12".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f64,
    pub height: f64,
    /// Gap between the overlay's right edge and the screen's right edge.
    pub offset_right: f64,
    /// Gap between the overlay's bottom edge and the screen's bottom edge.
    pub offset_bottom: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 675.0,
            height: 40.0,
            offset_right: 250.0,
            offset_bottom: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_retry_interval_seconds")]
    pub retry_interval_seconds: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_toggle_hotkey")]
    pub toggle_hotkey: String,
    pub window: WindowConfig,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub mock_url: Option<String>,
    #[serde(default)]
    pub config_version: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
            retry_interval_seconds: default_retry_interval_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            toggle_hotkey: default_toggle_hotkey(),
            window: WindowConfig::default(),
            debug: false,
            mock_url: None,
            config_version: CURRENT_CONFIG_VERSION,
        }
    }
}

/// One entry of the published event schedule. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub map: String,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

/// Wire shape of a schedule entry before the numeric fields are checked.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub name: String,
    pub map: String,
    pub start_time: serde_json::Number,
    pub end_time: serde_json::Number,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleApiResponse {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedView {
    /// Events running right now, in source order.
    pub active: Vec<Event>,
    /// Events that have not started yet, earliest first.
    pub upcoming: Vec<Event>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Live,
    Next,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Live => ViewMode::Next,
            ViewMode::Next => ViewMode::Live,
        }
    }
}

/// What the overlay label shows: a colored header segment and a colored content segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub header: String,
    pub header_color: String,
    pub content: String,
    pub content_color: String,
    pub alert: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Idle,
    Fetching,
    Succeeded { next_fetch_ms: i64 },
    Failed { next_fetch_ms: i64 },
}
