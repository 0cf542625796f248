use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use std::time::{Duration, Instant};

use crate::error::FetchError;
use crate::models::{AppConfig, Event, RawEvent, ScheduleApiResponse};

const USER_AGENT: &str = concat!("arc-overlay/", env!("CARGO_PKG_VERSION"));

/// Get the mock server base URL from config
fn mock_base_url(config_mock_url: Option<&str>) -> String {
    if let Some(url) = config_mock_url {
        if !url.is_empty() {
            return url.trim_end_matches('/').to_string();
        }
    }
    "http://localhost:3456".to_string()
}

/// Override URL to mock server if debug mode is enabled
fn debug_url(url: &str, debug: bool, config_mock_url: Option<&str>) -> String {
    if !debug {
        return url.to_string();
    }

    let base = mock_base_url(config_mock_url);

    // Keep the path so the mock can serve the same route
    if let Ok(parsed) = reqwest::Url::parse(url) {
        format!("{}{}", base, parsed.path())
    } else {
        warn!("debug mode: failed to parse URL '{}', using as-is", url);
        url.to_string()
    }
}

/// Anything that can produce a fresh event schedule.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    async fn fetch_schedule(&self) -> Result<Vec<Event>, FetchError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    url: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, String> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)));

        // Local mock servers usually run with self-signed certificates
        if config.debug {
            warn!("debug mode enabled - accepting invalid certificates");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| format!("failed to create HTTP client: {err}"))?;

        let url = debug_url(&config.api_url, config.debug, config.mock_url.as_deref());
        if config.debug {
            info!("API client initialized in debug mode against {}", url);
        }

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ScheduleSource for ApiClient {
    async fn fetch_schedule(&self) -> Result<Vec<Event>, FetchError> {
        debug!("fetching schedule from {}", self.url);
        let start = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let raw_text = response.text().await?;
        debug!(
            "schedule response: {} byte(s) in {} ms",
            raw_text.len(),
            start.elapsed().as_millis()
        );

        parse_schedule_body(&raw_text)
    }
}

/// Validates a schedule response body and parses its events.
///
/// Malformed entries are skipped; a payload without any usable entry counts as empty.
pub fn parse_schedule_body(raw: &str) -> Result<Vec<Event>, FetchError> {
    let payload: ScheduleApiResponse =
        serde_json::from_str(raw).map_err(|err| FetchError::Parse(err.to_string()))?;

    let data = match payload.data {
        Some(data) if !data.is_empty() => data,
        _ => return Err(FetchError::EmptyPayload),
    };

    let total = data.len();
    let events = parse_events(data);
    if events.is_empty() {
        warn!("none of the {total} schedule entries could be parsed");
        return Err(FetchError::EmptyPayload);
    }

    Ok(events)
}

/// Converts raw schedule entries, logging and dropping the ones that do not parse.
pub fn parse_events(data: Vec<serde_json::Value>) -> Vec<Event> {
    let mut events = Vec::with_capacity(data.len());
    for (idx, value) in data.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawEvent>(value)
            .map_err(|err| FetchError::Parse(err.to_string()))
            .and_then(Event::try_from);
        match parsed {
            Ok(event) => events.push(event),
            Err(err) => warn!("skipping schedule entry #{idx}: {err}"),
        }
    }
    events
}

fn epoch_ms(field: &str, value: &serde_json::Number) -> Result<i64, FetchError> {
    if let Some(ms) = value.as_i64() {
        return Ok(ms);
    }
    match value.as_f64() {
        Some(ms) if ms.is_finite() && ms.abs() < i64::MAX as f64 => Ok(ms.trunc() as i64),
        _ => Err(FetchError::Parse(format!("{field} out of range: {value}"))),
    }
}

impl TryFrom<RawEvent> for Event {
    type Error = FetchError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            start_time_ms: epoch_ms("startTime", &raw.start_time)?,
            end_time_ms: epoch_ms("endTime", &raw.end_time)?,
            name: raw.name,
            map: raw.map,
        })
    }
}
