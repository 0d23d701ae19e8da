//! Playback time tracking on the child device.
//!
//! Time is counted locally while a video plays and reported to the server in
//! whole minutes. The seconds accumulated since the last report are dropped
//! when playback stops, so usage is never over-counted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::api::{ApiClient, ClientError};
use crate::models::usage::UsageReport;

/// Seconds of playback that make up one reported minute.
pub const FLUSH_SECONDS: u32 = 60;

/// The tick interval used on a real device.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// The tracker state machine. Holds no I/O.
#[derive(Debug)]
pub struct PlaybackTracker {
    state: PlaybackState,
    accumulated_seconds: u32,
    locked: bool,
}

impl Default for PlaybackTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            accumulated_seconds: 0,
            locked: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn accumulated_seconds(&self) -> u32 {
        self.accumulated_seconds
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Starts or resumes playback. Refused once the child is locked.
    pub fn play(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Returns to `Idle` and drops the partial minute. Returns the dropped seconds.
    pub fn stop(&mut self) -> u32 {
        self.state = PlaybackState::Idle;
        std::mem::take(&mut self.accumulated_seconds)
    }

    /// Counts one second of wall time. Returns the minutes to report, if any.
    pub fn tick(&mut self) -> Option<i32> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        self.accumulated_seconds += 1;
        if self.accumulated_seconds >= FLUSH_SECONDS {
            self.accumulated_seconds = 0;
            return Some(1);
        }
        None
    }

    /// Applies the server's answer to a report. Returns `true` when playback must halt.
    pub fn apply_usage(&mut self, report: &UsageReport) -> bool {
        if report.is_locked {
            self.lock();
        }
        report.is_locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
        self.stop();
    }
}

/// Sends played minutes to the usage ledger.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    async fn report_minutes(&self, minutes: i32) -> Result<UsageReport, ClientError>;

    /// Called once when the child gets locked.
    async fn end_session(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Reports through the HTTP API with one child session token.
pub struct SessionReporter {
    client: ApiClient,
    token: String,
}

impl SessionReporter {
    pub fn new(client: ApiClient, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }
}

#[async_trait]
impl UsageReporter for SessionReporter {
    async fn report_minutes(&self, minutes: i32) -> Result<UsageReport, ClientError> {
        self.client.increment_usage(&self.token, minutes).await
    }

    async fn end_session(&self) -> Result<(), ClientError> {
        self.client.logout(&self.token).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A minute was recorded.
    UsageUpdated(UsageReport),
    /// The daily limit is reached; playback is halted and the tracker has exited.
    Locked,
    /// A report failed. The minute is not retried.
    FlushFailed(String),
    /// The session is gone; the tracker has exited.
    SessionExpired,
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Play,
    Pause,
    Stop,
}

/// Controls a running tracker task.
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    pub async fn play(&self) {
        let _ = self.commands.send(Command::Play).await;
    }

    pub async fn pause(&self) {
        let _ = self.commands.send(Command::Pause).await;
    }

    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop).await;
    }

    /// Ends the tracker without reporting the partial minute.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("Tracker task ended abnormally: {}", e);
        }
    }
}

async fn end_locked_session(reporter: &dyn UsageReporter) {
    if let Err(e) = reporter.end_session().await {
        tracing::debug!("Ending the locked session failed: {}", e);
    }
}

/// Runs a [`PlaybackTracker`] on a timer, reporting one minute at a time.
///
/// Reports are awaited one after another, so increments for a child never
/// overlap. Cancellation also interrupts a report in flight. On lock the
/// session is ended before the task exits. The task also exits when the
/// session expires or the handle is dropped.
pub fn spawn_tracker(
    reporter: Arc<dyn UsageReporter>,
    tick: Duration,
    cancel: CancellationToken,
) -> (TrackerHandle, mpsc::Receiver<TrackerEvent>) {
    let (command_tx, mut command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(16);
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let mut tracker = PlaybackTracker::new();
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    let dropped = tracker.stop();
                    tracing::debug!(dropped, "Tracker cancelled");
                    break;
                }
                command = command_rx.recv() => match command {
                    Some(Command::Play) => {
                        tracker.play();
                    }
                    Some(Command::Pause) => tracker.pause(),
                    Some(Command::Stop) => {
                        tracker.stop();
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let Some(minutes) = tracker.tick() else { continue };
                    let outcome = tokio::select! {
                        _ = task_cancel.cancelled() => {
                            tracker.stop();
                            tracing::debug!("Tracker cancelled during a report");
                            break;
                        }
                        outcome = reporter.report_minutes(minutes) => outcome,
                    };
                    match outcome {
                        Ok(report) => {
                            let halt = tracker.apply_usage(&report);
                            let _ = event_tx.send(TrackerEvent::UsageUpdated(report)).await;
                            if halt {
                                end_locked_session(reporter.as_ref()).await;
                                let _ = event_tx.send(TrackerEvent::Locked).await;
                                break;
                            }
                        }
                        Err(ClientError::Locked) => {
                            tracker.lock();
                            end_locked_session(reporter.as_ref()).await;
                            let _ = event_tx.send(TrackerEvent::Locked).await;
                            break;
                        }
                        Err(ClientError::SessionExpired) => {
                            tracker.stop();
                            let _ = event_tx.send(TrackerEvent::SessionExpired).await;
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Usage report failed: {}", e);
                            let _ = event_tx.send(TrackerEvent::FlushFailed(e.to_string())).await;
                        }
                    }
                }
            }
        }
    });

    (
        TrackerHandle {
            commands: command_tx,
            cancel,
            task,
        },
        event_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn report(used: i32, limit: i32) -> UsageReport {
        UsageReport {
            success: true,
            time_used_today: used,
            daily_limit: limit,
            remaining_minutes: (limit - used).max(0),
            is_locked: used >= limit,
        }
    }

    #[test]
    fn idle_and_paused_do_not_count() {
        let mut tracker = PlaybackTracker::new();
        assert_eq!(tracker.tick(), None);
        assert_eq!(tracker.accumulated_seconds(), 0);

        tracker.play();
        tracker.tick();
        tracker.pause();
        tracker.tick();
        assert_eq!(tracker.state(), PlaybackState::Paused);
        assert_eq!(tracker.accumulated_seconds(), 1);
    }

    #[test]
    fn sixty_seconds_flush_one_minute() {
        let mut tracker = PlaybackTracker::new();
        tracker.play();
        for _ in 0..59 {
            assert_eq!(tracker.tick(), None);
        }
        assert_eq!(tracker.tick(), Some(1));
        assert_eq!(tracker.accumulated_seconds(), 0);
    }

    #[test]
    fn pause_and_resume_keep_the_accumulator() {
        let mut tracker = PlaybackTracker::new();
        tracker.play();
        for _ in 0..30 {
            tracker.tick();
        }
        tracker.pause();
        tracker.play();
        for _ in 0..29 {
            assert_eq!(tracker.tick(), None);
        }
        assert_eq!(tracker.tick(), Some(1));
    }

    #[test]
    fn stop_discards_the_partial_minute() {
        let mut tracker = PlaybackTracker::new();
        tracker.play();
        for _ in 0..59 {
            tracker.tick();
        }
        assert_eq!(tracker.stop(), 59);
        assert_eq!(tracker.state(), PlaybackState::Idle);

        tracker.play();
        assert_eq!(tracker.tick(), None);
        assert_eq!(tracker.accumulated_seconds(), 1);
    }

    #[test]
    fn locked_report_halts_and_refuses_play() {
        let mut tracker = PlaybackTracker::new();
        tracker.play();
        assert!(!tracker.apply_usage(&report(59, 60)));
        assert_eq!(tracker.state(), PlaybackState::Playing);

        assert!(tracker.apply_usage(&report(60, 60)));
        assert_eq!(tracker.state(), PlaybackState::Idle);
        assert!(!tracker.play());
        assert_eq!(tracker.tick(), None);
    }

    struct CountingReporter {
        used: AtomicI32,
        limit: i32,
        calls: AtomicI32,
        ended: AtomicI32,
    }

    impl CountingReporter {
        fn new(used: i32, limit: i32) -> Self {
            Self {
                used: AtomicI32::new(used),
                limit,
                calls: AtomicI32::new(0),
                ended: AtomicI32::new(0),
            }
        }
    }

    #[async_trait]
    impl UsageReporter for CountingReporter {
        async fn report_minutes(&self, minutes: i32) -> Result<UsageReport, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let used = self.used.fetch_add(minutes, Ordering::SeqCst) + minutes;
            Ok(report(used, self.limit))
        }

        async fn end_session(&self) -> Result<(), ClientError> {
            self.ended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_reports_and_exits_on_lock() {
        let reporter = Arc::new(CountingReporter::new(58, 60));
        let (handle, mut events) =
            spawn_tracker(reporter.clone(), DEFAULT_TICK, CancellationToken::new());
        handle.play().await;

        assert_eq!(events.recv().await, Some(TrackerEvent::UsageUpdated(report(59, 60))));
        assert_eq!(events.recv().await, Some(TrackerEvent::UsageUpdated(report(60, 60))));
        assert_eq!(events.recv().await, Some(TrackerEvent::Locked));
        assert_eq!(events.recv().await, None);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.ended.load(Ordering::SeqCst), 1);
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_never_flushes_a_partial_minute() {
        let reporter = Arc::new(CountingReporter::new(0, 60));
        let cancel = CancellationToken::new();
        let (handle, mut events) = spawn_tracker(reporter.clone(), DEFAULT_TICK, cancel.clone());
        handle.play().await;

        tokio::time::sleep(Duration::from_secs(50)).await;
        cancel.cancel();

        assert_eq!(events.recv().await, None);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.ended.load(Ordering::SeqCst), 0);
        handle.join().await;
    }

    struct ExpiredReporter;

    #[async_trait]
    impl UsageReporter for ExpiredReporter {
        async fn report_minutes(&self, _minutes: i32) -> Result<UsageReport, ClientError> {
            Err(ClientError::SessionExpired)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_stops_the_driver() {
        let (handle, mut events) =
            spawn_tracker(Arc::new(ExpiredReporter), DEFAULT_TICK, CancellationToken::new());
        handle.play().await;

        assert_eq!(events.recv().await, Some(TrackerEvent::SessionExpired));
        assert_eq!(events.recv().await, None);
        handle.join().await;
    }

    struct LockedReporter(AtomicI32);

    #[async_trait]
    impl UsageReporter for LockedReporter {
        async fn report_minutes(&self, _minutes: i32) -> Result<UsageReport, ClientError> {
            Err(ClientError::Locked)
        }

        async fn end_session(&self) -> Result<(), ClientError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::SessionExpired)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn locked_answer_ends_the_session_once() {
        let reporter = Arc::new(LockedReporter(AtomicI32::new(0)));
        let (handle, mut events) =
            spawn_tracker(reporter.clone(), DEFAULT_TICK, CancellationToken::new());
        handle.play().await;

        assert_eq!(events.recv().await, Some(TrackerEvent::Locked));
        assert_eq!(events.recv().await, None);
        assert_eq!(reporter.0.load(Ordering::SeqCst), 1);
        handle.join().await;
    }

    struct StalledReporter;

    #[async_trait]
    impl UsageReporter for StalledReporter {
        async fn report_minutes(&self, _minutes: i32) -> Result<UsageReport, ClientError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_stalled_report() {
        let cancel = CancellationToken::new();
        let (handle, mut events) =
            spawn_tracker(Arc::new(StalledReporter), DEFAULT_TICK, cancel.clone());
        handle.play().await;

        tokio::time::sleep(Duration::from_secs(90)).await;
        handle.cancel();

        assert_eq!(events.recv().await, None);
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("tracker did not exit after cancel");
    }
}
