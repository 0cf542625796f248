use crate::models::{ClassifiedView, DisplayState, Event, ViewMode};

pub const LIVE_HEADER: &str = "LIVE";
pub const NEXT_HEADER: &str = "NEXT";
pub const NO_ACTIVE_EVENTS: &str = "No Active Events";
pub const NO_UPCOMING_DATA: &str = "No Upcoming Data";
pub const FETCHING_DATA: &str = "Fetching data...";

const LIVE_COLOR: &str = "#ADFF2F";
const NEXT_COLOR: &str = "#00FFFF";
const CONTENT_COLOR: &str = "#FFFFFF";
const ALERT_COLOR: &str = "#FF4500";

const SEPARATOR: &str = " • ";
const NEXT_PREVIEW_LIMIT: usize = 3;
const MINUTE_MS: i64 = 60_000;

/// Shortens event names that do not fit the overlay.
pub fn display_name(name: &str) -> &str {
    match name {
        "Electromagnetic Storm" => "EMS",
        other => other,
    }
}

fn whole_minutes(delta_ms: i64) -> i64 {
    delta_ms.div_euclid(MINUTE_MS)
}

fn header_for(mode: ViewMode) -> (&'static str, &'static str) {
    match mode {
        ViewMode::Live => (LIVE_HEADER, LIVE_COLOR),
        ViewMode::Next => (NEXT_HEADER, NEXT_COLOR),
    }
}

fn format_live(active: &[Event], now_ms: i64) -> String {
    let Some(ends_first) = active.iter().map(|event| event.end_time_ms).min() else {
        return NO_ACTIVE_EVENTS.to_string();
    };

    let labels: Vec<String> = active
        .iter()
        .map(|event| format!("{} ({})", display_name(&event.name), event.map))
        .collect();
    let minutes_left = whole_minutes(ends_first - now_ms).max(0);

    format!("{}{SEPARATOR}{minutes_left}m left", labels.join(SEPARATOR))
}

fn format_next(upcoming: &[Event], now_ms: i64) -> String {
    if upcoming.is_empty() {
        return NO_UPCOMING_DATA.to_string();
    }

    upcoming
        .iter()
        .take(NEXT_PREVIEW_LIMIT)
        .map(|event| {
            let minutes_to_start = whole_minutes(event.start_time_ms - now_ms).max(0);
            format!("{} ({}, {minutes_to_start}m)", event.name, event.map)
        })
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Renders the header and content text for `mode`.
///
/// LIVE lists every running event and one countdown: the minutes left on the event that
/// ends first. NEXT lists up to three upcoming events with minutes until each starts.
pub fn format_display(view: &ClassifiedView, mode: ViewMode, now_ms: i64) -> (String, String) {
    let content = match mode {
        ViewMode::Live => format_live(&view.active, now_ms),
        ViewMode::Next => format_next(&view.upcoming, now_ms),
    };
    (header_for(mode).0.to_string(), content)
}

pub fn display_state(view: &ClassifiedView, mode: ViewMode, now_ms: i64) -> DisplayState {
    let (header, content) = format_display(view, mode, now_ms);
    DisplayState {
        header,
        header_color: header_for(mode).1.to_string(),
        content,
        content_color: CONTENT_COLOR.to_string(),
        alert: false,
    }
}

/// A state that carries a status line instead of schedule data.
pub fn status_state(mode: ViewMode, message: &str, alert: bool) -> DisplayState {
    let (header, header_color) = header_for(mode);
    let content_color = if alert { ALERT_COLOR } else { CONTENT_COLOR };
    DisplayState {
        header: header.to_string(),
        header_color: header_color.to_string(),
        content: message.to_string(),
        content_color: content_color.to_string(),
        alert,
    }
}
