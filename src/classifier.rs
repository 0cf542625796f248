use crate::models::{ClassifiedView, Event};

/// Splits the schedule into events running at `now_ms` and events still to come.
///
/// Events that already ended are dropped. Upcoming events are ordered by start time;
/// events starting at the same instant keep their schedule order.
pub fn classify(schedule: &[Event], now_ms: i64) -> ClassifiedView {
    let mut view = ClassifiedView::default();

    for event in schedule {
        if event.start_time_ms <= now_ms && now_ms < event.end_time_ms {
            view.active.push(event.clone());
        } else if now_ms < event.start_time_ms {
            view.upcoming.push(event.clone());
        }
    }

    view.upcoming.sort_by_key(|event| event.start_time_ms);
    view
}
