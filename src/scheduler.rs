use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::api_client::ScheduleSource;
use crate::controller::{ControlMessage, ViewController};
use crate::models::{AppConfig, DisplayState, PollPhase};

/// Countdowns are re-rendered on this cadence even without new data.
pub const UI_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

const CONTROL_CHANNEL_CAPACITY: usize = 32;

/// Where rendered states go. The overlay window is the production surface.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    async fn render(&self, state: DisplayState) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Delay before the next fetch after a successful one.
    pub refresh: Duration,
    /// Delay before the next fetch after a failed one.
    pub retry: Duration,
    pub ui_refresh: Duration,
}

impl PollTiming {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            refresh: Duration::from_secs(config.refresh_interval_seconds),
            retry: Duration::from_secs(config.retry_interval_seconds),
            ui_refresh: UI_REFRESH_INTERVAL,
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Handles to the running tasks; dropping the senders alone does not stop them.
struct RuntimeTasks {
    stop_tx: watch::Sender<bool>,
    refresh_tx: mpsc::Sender<()>,
    control_tx: mpsc::Sender<ControlMessage>,
    phase_rx: watch::Receiver<PollPhase>,
    poll_handle: JoinHandle<()>,
    tick_handle: JoinHandle<()>,
    render_handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct OverlayRuntime {
    tasks: Option<RuntimeTasks>,
}

impl OverlayRuntime {
    pub fn new() -> Self {
        Self { tasks: None }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.is_some()
    }

    /// Spawns the poller, the refresh ticker and the render task. Must be called from
    /// within a tokio runtime.
    pub async fn start(
        &mut self,
        source: Arc<dyn ScheduleSource>,
        surface: Arc<dyn DisplaySurface>,
        timing: PollTiming,
    ) {
        self.stop().await;

        info!(
            "overlay runtime starting (refresh {}s, retry {}s)",
            timing.refresh.as_secs(),
            timing.retry.as_secs()
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Idle);

        let render_handle = tokio::spawn(render_task(control_rx, surface, stop_rx.clone()));

        let tick_handle = tokio::spawn(ui_refresh_task(
            control_tx.clone(),
            timing.ui_refresh,
            stop_rx.clone(),
        ));

        let poll_handle = tokio::spawn(poller_task(
            source,
            control_tx.clone(),
            phase_tx,
            timing,
            refresh_rx,
            stop_rx,
        ));

        self.tasks = Some(RuntimeTasks {
            stop_tx,
            refresh_tx,
            control_tx,
            phase_rx,
            poll_handle,
            tick_handle,
            render_handle,
        });
    }

    pub async fn stop(&mut self) {
        let Some(tasks) = self.tasks.take() else {
            return;
        };

        info!("overlay runtime stopping");
        let _ = tasks.stop_tx.send(true);

        let _ = tasks.poll_handle.await;
        let _ = tasks.tick_handle.await;
        let _ = tasks.render_handle.await;
        info!("overlay runtime stopped");
    }

    /// Fetches right away, replacing whatever fetch was scheduled.
    pub fn refresh_now(&self) -> Result<(), String> {
        let tasks = self.tasks.as_ref().ok_or("overlay runtime is not running")?;
        match tasks.refresh_tx.try_send(()) {
            Ok(()) => Ok(()),
            // A refresh is already queued; it covers this request too.
            Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err("schedule poller has stopped".into()),
        }
    }

    pub async fn toggle_view(&self) -> Result<(), String> {
        let tasks = self.tasks.as_ref().ok_or("overlay runtime is not running")?;
        tasks
            .control_tx
            .send(ControlMessage::ToggleView)
            .await
            .map_err(|_| "render task has stopped".to_string())
    }

    pub fn poll_phase(&self) -> PollPhase {
        self.tasks
            .as_ref()
            .map(|tasks| *tasks.phase_rx.borrow())
            .unwrap_or_default()
    }
}

/// Runs one fetch, forwards the outcome and returns how long to wait before the next one.
pub async fn poll_once(
    source: &dyn ScheduleSource,
    control_tx: &mpsc::Sender<ControlMessage>,
    phase_tx: &watch::Sender<PollPhase>,
    timing: &PollTiming,
) -> Duration {
    phase_tx.send_replace(PollPhase::Fetching);

    let (message, delay, phase) = match source.fetch_schedule().await {
        Ok(events) => {
            info!(
                "schedule fetched ({} event(s)); next fetch in {}s",
                events.len(),
                timing.refresh.as_secs()
            );
            let next_fetch_ms = now_ms() + timing.refresh.as_millis() as i64;
            (
                ControlMessage::ScheduleFetched(events),
                timing.refresh,
                PollPhase::Succeeded { next_fetch_ms },
            )
        }
        Err(err) => {
            warn!(
                "{} ({}); retrying in {}s",
                err.display_message(),
                err,
                timing.retry.as_secs()
            );
            let next_fetch_ms = now_ms() + timing.retry.as_millis() as i64;
            (
                ControlMessage::FetchFailed(err),
                timing.retry,
                PollPhase::Failed { next_fetch_ms },
            )
        }
    };

    if control_tx.send(message).await.is_err() {
        warn!("render task is gone; dropping fetch result");
    }
    phase_tx.send_replace(phase);
    delay
}

/// Poller task - one fetch at a time, re-armed by the outcome of the last fetch
async fn poller_task(
    source: Arc<dyn ScheduleSource>,
    control_tx: mpsc::Sender<ControlMessage>,
    phase_tx: watch::Sender<PollPhase>,
    timing: PollTiming,
    mut refresh_rx: mpsc::Receiver<()>,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!("schedule poller started");

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let delay = tokio::select! {
            delay = poll_once(source.as_ref(), &control_tx, &phase_tx, &timing) => delay,
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        // Requests that arrived mid-fetch were answered by that fetch.
        while refresh_rx.try_recv().is_ok() {}

        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            Some(()) = refresh_rx.recv() => {
                info!("manual refresh requested, cancelling pending fetch timer");
            }
            _ = time::sleep(delay) => {}
        }
    }

    phase_tx.send_replace(PollPhase::Idle);
    info!("schedule poller stopped");
}

/// UI refresh task - asks for a reclassification on a fixed cadence
async fn ui_refresh_task(
    control_tx: mpsc::Sender<ControlMessage>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if control_tx.send(ControlMessage::Tick).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("ui refresh timer stopped");
}

/// Render task - sole owner of the view controller; applies messages in arrival order
async fn render_task(
    mut control_rx: mpsc::Receiver<ControlMessage>,
    surface: Arc<dyn DisplaySurface>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut controller = ViewController::new();

    if let Err(err) = surface.render(controller.current_display(now_ms())).await {
        error!("failed to render initial overlay state: {}", err);
    }

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            message = control_rx.recv() => {
                let Some(message) = message else {
                    break;
                };
                let Some(state) = controller.apply(message, now_ms()) else {
                    continue;
                };
                debug!("rendering {:?} view (feed {:?})", controller.mode(), controller.feed());
                if let Err(err) = surface.render(state).await {
                    error!("failed to render overlay: {}", err);
                }
            }
        }
    }

    info!("render task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::Event;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        calls: AtomicUsize,
        outcome: Result<Vec<Event>, FetchError>,
    }

    impl FakeSource {
        fn new(outcome: Result<Vec<Event>, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScheduleSource for FakeSource {
        async fn fetch_schedule(&self) -> Result<Vec<Event>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        states: Mutex<Vec<DisplayState>>,
    }

    impl RecordingSurface {
        fn last(&self) -> Option<DisplayState> {
            self.states.lock().unwrap().last().cloned()
        }

        fn count(&self) -> usize {
            self.states.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DisplaySurface for RecordingSurface {
        async fn render(&self, state: DisplayState) -> Result<(), String> {
            self.states.lock().unwrap().push(state);
            Ok(())
        }
    }

    fn timing() -> PollTiming {
        PollTiming {
            refresh: Duration::from_secs(3_600),
            retry: Duration::from_secs(300),
            ui_refresh: Duration::from_secs(60),
        }
    }

    fn running_event() -> Event {
        let now = now_ms();
        Event {
            name: "Harvester".to_string(),
            map: "Dam".to_string(),
            start_time_ms: now - 60_000,
            end_time_ms: now + 3_600_000,
        }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn poll_once_picks_delay_from_outcome() {
        let (control_tx, mut control_rx) = mpsc::channel(4);
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Idle);

        let failing = FakeSource::new(Err(FetchError::HttpStatus(500)));
        let delay = poll_once(failing.as_ref(), &control_tx, &phase_tx, &timing()).await;
        assert_eq!(delay, Duration::from_secs(300));
        assert_eq!(
            control_rx.recv().await,
            Some(ControlMessage::FetchFailed(FetchError::HttpStatus(500)))
        );
        assert!(matches!(*phase_rx.borrow(), PollPhase::Failed { .. }));

        let working = FakeSource::new(Ok(vec![running_event()]));
        let delay = poll_once(working.as_ref(), &control_tx, &phase_tx, &timing()).await;
        assert_eq!(delay, Duration::from_secs(3_600));
        assert!(matches!(
            control_rx.recv().await,
            Some(ControlMessage::ScheduleFetched(events)) if events.len() == 1
        ));
        assert!(matches!(*phase_rx.borrow(), PollPhase::Succeeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn http_error_is_shown_and_retried_after_short_interval() {
        let source = FakeSource::new(Err(FetchError::HttpStatus(500)));
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;

        assert_eq!(source.calls(), 1);
        let shown = surface.last().expect("error rendered");
        assert_eq!(shown.content, "Error fetching data");
        assert!(shown.alert);
        assert!(matches!(runtime.poll_phase(), PollPhase::Failed { .. }));

        time::sleep(Duration::from_secs(250)).await;
        assert_eq!(source.calls(), 1);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);

        runtime.stop().await;
        assert!(!runtime.is_running());
        assert_eq!(runtime.poll_phase(), PollPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn success_waits_for_refresh_interval() {
        let source = FakeSource::new(Ok(vec![running_event()]));
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;

        assert_eq!(source.calls(), 1);
        assert_eq!(surface.last().expect("rendered").header, "LIVE");

        time::sleep(Duration::from_secs(1_800)).await;
        assert_eq!(source.calls(), 1);

        time::sleep(Duration::from_secs(1_801)).await;
        assert_eq!(source.calls(), 2);

        runtime.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_cancels_pending_timer() {
        let source = FakeSource::new(Ok(vec![running_event()]));
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;
        assert_eq!(source.calls(), 1);

        runtime.refresh_now().expect("refresh accepted");
        runtime.refresh_now().expect("duplicate request coalesced");
        settle().await;
        assert_eq!(source.calls(), 2);

        runtime.stop().await;
    }

    /// Holds every fetch open until the test releases it.
    #[derive(Default)]
    struct GatedSource {
        calls: AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl ScheduleSource for GatedSource {
        async fn fetch_schedule(&self) -> Result<Vec<Event>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(vec![running_event()])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_during_fetch_is_answered_by_that_fetch() {
        let source = Arc::new(GatedSource::default());
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.poll_phase(), PollPhase::Fetching);

        runtime.refresh_now().expect("refresh accepted");
        runtime.refresh_now().expect("duplicate request coalesced");

        source.gate.notify_one();
        settle().await;
        assert!(matches!(runtime.poll_phase(), PollPhase::Succeeded { .. }));

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(3_100)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        runtime.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_is_accepted_before_first_fetch_completes() {
        let source = Arc::new(GatedSource::default());
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        runtime.toggle_view().await.expect("toggle accepted");
        settle().await;

        let shown = surface.last().expect("rendered");
        assert_eq!(shown.header, "NEXT");
        assert_eq!(shown.content, "Fetching data...");

        runtime.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_rerender_without_fetching() {
        let source = FakeSource::new(Ok(vec![running_event()]));
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;
        // Initial "Fetching data..." plus the fetched schedule.
        assert_eq!(surface.count(), 2);

        time::sleep(Duration::from_secs(125)).await;
        assert_eq!(surface.count(), 4);
        assert_eq!(source.calls(), 1);

        runtime.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_view_rerenders_with_next_header() {
        let source = FakeSource::new(Ok(vec![running_event()]));
        let surface = Arc::new(RecordingSurface::default());
        let mut runtime = OverlayRuntime::new();

        runtime.start(source.clone(), surface.clone(), timing()).await;
        settle().await;

        runtime.toggle_view().await.expect("toggle accepted");
        settle().await;

        let shown = surface.last().expect("rendered");
        assert_eq!(shown.header, "NEXT");
        assert_eq!(shown.content, "No Upcoming Data");

        runtime.stop().await;
    }

    #[tokio::test]
    async fn commands_fail_when_not_running() {
        let runtime = OverlayRuntime::new();
        assert!(runtime.refresh_now().is_err());
        assert!(runtime.toggle_view().await.is_err());
        assert_eq!(runtime.poll_phase(), PollPhase::Idle);
    }
}
