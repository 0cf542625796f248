use log::{debug, info};

use crate::classifier::classify;
use crate::error::FetchError;
use crate::formatter::{display_state, status_state, FETCHING_DATA};
use crate::models::{ClassifiedView, DisplayState, Event, ViewMode};

/// Inputs to the view controller, sent from the background tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    ScheduleFetched(Vec<Event>),
    FetchFailed(FetchError),
    Tick,
    ToggleView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedStatus {
    #[default]
    Pending,
    Ready,
    Failed(FetchError),
}

/// Owns the latest schedule, its classification and the view mode.
#[derive(Debug, Default)]
pub struct ViewController {
    schedule: Vec<Event>,
    view: ClassifiedView,
    mode: ViewMode,
    feed: FeedStatus,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn feed(&self) -> &FeedStatus {
        &self.feed
    }

    /// Applies one message; returns the state to render, or `None` when the display
    /// should stay as it is.
    pub fn apply(&mut self, message: ControlMessage, now_ms: i64) -> Option<DisplayState> {
        match message {
            ControlMessage::ScheduleFetched(events) => {
                info!("schedule replaced with {} event(s)", events.len());
                self.schedule = events;
                self.feed = FeedStatus::Ready;
                self.reclassify(now_ms);
                Some(self.current_display(now_ms))
            }
            ControlMessage::FetchFailed(err) => {
                let state = status_state(self.mode, err.display_message(), true);
                self.feed = FeedStatus::Failed(err);
                Some(state)
            }
            ControlMessage::Tick => {
                if self.schedule.is_empty() {
                    debug!("refresh tick skipped: no schedule yet");
                    return None;
                }
                self.reclassify(now_ms);
                Some(self.current_display(now_ms))
            }
            ControlMessage::ToggleView => {
                self.mode = self.mode.toggled();
                info!("view toggled to {:?}", self.mode);
                Some(self.current_display(now_ms))
            }
        }
    }

    /// Renders the current view without reclassifying.
    pub fn current_display(&self, now_ms: i64) -> DisplayState {
        if self.schedule.is_empty() {
            match &self.feed {
                FeedStatus::Pending => return status_state(self.mode, FETCHING_DATA, false),
                FeedStatus::Failed(err) => {
                    return status_state(self.mode, err.display_message(), true)
                }
                FeedStatus::Ready => {}
            }
        }
        display_state(&self.view, self.mode, now_ms)
    }

    fn reclassify(&mut self, now_ms: i64) {
        self.view = classify(&self.schedule, now_ms);
        debug!(
            "classified schedule: {} active, {} upcoming",
            self.view.active.len(),
            self.view.upcoming.len()
        );
    }
}
