use std::sync::Arc;

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::events::{EventBus, ReaderEvent};
use crate::text::DisplayUnit;

use super::{AdvanceOutcome, PlaybackSnapshot, PlaybackState, ScheduledAdvance, SkipDirection};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

struct SchedulerInner {
    state: PlaybackState,
    /// The single pending advance. Replaced under the same lock that mutates
    /// `state`, so at most one advance is ever armed.
    pending: Option<JoinHandle<()>>,
}

/// Owns playback state and the one timer that drives it.
#[derive(Clone)]
pub struct PlaybackScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    events: EventBus,
}

impl PlaybackScheduler {
    pub fn new(state: PlaybackState, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                state,
                pending: None,
            })),
            events,
        }
    }

    pub async fn get_state(&self) -> PlaybackState {
        self.inner.lock().await.state.clone()
    }

    pub async fn get_snapshot(&self) -> PlaybackSnapshot {
        self.inner.lock().await.state.snapshot()
    }

    pub async fn index(&self) -> usize {
        self.inner.lock().await.state.index
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.lock().await.state.is_playing
    }

    pub async fn wpm(&self) -> u32 {
        self.inner.lock().await.state.wpm
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.state.units.is_empty()
    }

    /// Replaces the unit sequence. Any pending advance is cancelled and
    /// playback returns to idle at index 0.
    pub async fn load(&self, units: Vec<DisplayUnit>, chunked: bool) {
        let mut inner = self.inner.lock().await;
        inner.state.load(units, chunked);
        self.arm(&mut inner, None);
        log_debug!(
            "loaded {} {} units",
            inner.state.units.len(),
            if chunked { "chunk" } else { "word" }
        );
        self.emit_changed(&inner.state);
    }

    /// Swaps the unit sequence at `index` without resetting reading stats,
    /// resuming when `resume` is set.
    pub async fn replace_units(
        &self,
        units: Vec<DisplayUnit>,
        chunked: bool,
        index: usize,
        resume: bool,
    ) {
        let mut inner = self.inner.lock().await;
        inner.state.replace_units(units, chunked, index);
        let step = if resume {
            inner.state.play(Instant::now())
        } else {
            None
        };
        self.arm(&mut inner, step);
        log_debug!(
            "switched to {} units at index {}",
            inner.state.units.len(),
            inner.state.index
        );
        self.emit_changed(&inner.state);
    }

    /// Returns `false` when there is nothing to read.
    pub async fn play(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.units.is_empty() {
            log_debug!("play ignored: nothing to read");
            return false;
        }
        if inner.state.is_playing {
            return true;
        }
        let step = inner.state.play(Instant::now());
        self.arm(&mut inner, step);
        log_info!("playback started at index {}", inner.state.index);
        self.emit_changed(&inner.state);
        true
    }

    pub async fn pause(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state.pause() {
            self.arm(&mut inner, None);
            log_info!("playback paused at index {}", inner.state.index);
            self.emit_changed(&inner.state);
        }
    }

    pub async fn toggle_play(&self) -> bool {
        if self.is_playing().await {
            self.pause().await;
            false
        } else {
            self.play().await
        }
    }

    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.state.stop();
        self.arm(&mut inner, None);
        log_debug!("playback stopped");
        self.emit_changed(&inner.state);
    }

    pub async fn seek(&self, target: i64) {
        self.mutate(|state| state.seek(target)).await;
    }

    pub async fn seek_percent(&self, percent: f64) {
        self.mutate(|state| state.seek_percent(percent)).await;
    }

    pub async fn skip(&self, direction: SkipDirection) {
        self.mutate(|state| state.skip(direction)).await;
    }

    pub async fn set_wpm(&self, wpm: u32) {
        self.mutate(|state| state.set_wpm(wpm)).await;
    }

    pub async fn adjust_wpm(&self, delta: i32) {
        self.mutate(|state| state.adjust_wpm(delta)).await;
    }

    pub async fn set_units_per_step(&self, units_per_step: usize) {
        self.mutate(|state| state.set_units_per_step(units_per_step))
            .await;
    }

    pub async fn set_font_size(&self, font_size: u32) {
        let mut inner = self.inner.lock().await;
        inner.state.set_font_size(font_size);
        self.emit_changed(&inner.state);
    }

    pub async fn set_speed_multiplier(&self, multiplier: f64) {
        let mut inner = self.inner.lock().await;
        inner.state.set_speed_multiplier(multiplier);
    }

    pub async fn speed_multiplier(&self) -> f64 {
        self.inner.lock().await.state.speed_multiplier
    }

    /// Runs a state operation that may need the pending advance replaced.
    /// A `None` schedule while playing leaves the current timer armed.
    async fn mutate<F>(&self, op: F)
    where
        F: FnOnce(&mut PlaybackState) -> Option<ScheduledAdvance>,
    {
        let mut inner = self.inner.lock().await;
        if let Some(step) = op(&mut inner.state) {
            self.arm(&mut inner, Some(step));
        }
        self.emit_changed(&inner.state);
    }

    fn arm(&self, inner: &mut SchedulerInner, step: Option<ScheduledAdvance>) {
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }

        let Some(step) = step else {
            return;
        };

        let scheduler = self.clone();
        inner.pending = Some(tokio::spawn(async move {
            time::sleep(step.delay).await;
            scheduler.fire(step.epoch).await;
        }));
    }

    async fn fire(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        match inner.state.advance(epoch, Instant::now()) {
            AdvanceOutcome::Stale => {
                log_debug!("dropped stale advance (epoch {epoch})");
                return;
            }
            AdvanceOutcome::Next(step) => {
                // This task is the pending handle; detach it instead of aborting itself.
                inner.pending = None;
                self.arm(&mut inner, Some(step));
            }
            AdvanceOutcome::Finished => {
                inner.pending = None;
                log_info!(
                    "playback finished: {} words in {:?}s",
                    inner.state.total_words(),
                    inner.state.read_elapsed_secs
                );
            }
        }
        self.emit_changed(&inner.state);
    }

    fn emit_changed(&self, state: &PlaybackState) {
        self.events.emit(ReaderEvent::PlaybackChanged {
            snapshot: state.snapshot(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackStatus;
    use crate::text::tokenize;
    use std::time::Duration;

    fn scheduler(text: &str) -> PlaybackScheduler {
        let mut state = PlaybackState::new(300, 1, 48);
        state.load(tokenize(text), false);
        PlaybackScheduler::new(state, EventBus::new())
    }

    fn plain_words(count: usize) -> String {
        vec!["word"; count].join(" ")
    }

    #[tokio::test(start_paused = true)]
    async fn plays_through_to_finished() {
        let scheduler = scheduler("The quick brown fox jumps.");
        assert!(scheduler.play().await);

        // The(220) quick(200) brown(200) fox(200) jumps.(300)
        time::sleep(Duration::from_millis(830)).await;
        assert_eq!(scheduler.index().await, 4);
        assert!(scheduler.is_playing().await);

        time::sleep(Duration::from_millis(320)).await;
        let state = scheduler.get_state().await;
        assert_eq!(state.index, 5);
        assert!(!state.is_playing);
        assert_eq!(state.status(), PlaybackStatus::Finished);

        scheduler.stop().await;
        assert_eq!(scheduler.index().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn smart_pacer_chunks_use_ai_multipliers() {
        let scheduler = scheduler("");
        scheduler
            .load(
                vec![
                    DisplayUnit::chunk("The quick", 1.2),
                    DisplayUnit::chunk("brown fox jumps.", 0.8),
                ],
                true,
            )
            .await;
        scheduler.play().await;

        time::sleep(Duration::from_millis(230)).await;
        assert_eq!(scheduler.index().await, 0);
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.index().await, 1);
        time::sleep(Duration::from_millis(170)).await;
        assert_eq!(scheduler.get_state().await.status(), PlaybackStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn play_on_empty_text_does_nothing() {
        let scheduler = scheduler("  ");
        assert!(!scheduler.play().await);
        let state = scheduler.get_state().await;
        assert!(!state.is_playing);
        assert_eq!(state.index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_pending_advance() {
        let scheduler = scheduler(&plain_words(20));
        scheduler.play().await;
        time::sleep(Duration::from_millis(150)).await;
        scheduler.pause().await;
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.index().await, 0);

        scheduler.pause().await;
        assert_eq!(scheduler.get_state().await.status(), PlaybackStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_seeks_leave_exactly_one_timer() {
        let scheduler = scheduler(&plain_words(100));
        scheduler.play().await;
        for target in [10, 20, 30, 40] {
            scheduler.seek(target).await;
        }
        // A leaked timer would advance twice inside this window.
        time::sleep(Duration::from_millis(210)).await;
        assert_eq!(scheduler.index().await, 41);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(scheduler.index().await, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_restarts_the_step_delay() {
        let scheduler = scheduler(&plain_words(100));
        scheduler.play().await;
        time::sleep(Duration::from_millis(150)).await;
        scheduler.seek(50).await;
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.index().await, 50);
        time::sleep(Duration::from_millis(110)).await;
        assert_eq!(scheduler.index().await, 51);
    }

    #[tokio::test(start_paused = true)]
    async fn wpm_change_reschedules_immediately() {
        let scheduler = scheduler(&plain_words(100));
        scheduler.play().await;
        time::sleep(Duration::from_millis(100)).await;
        scheduler.set_wpm(150).await;
        time::sleep(Duration::from_millis(110)).await;
        assert_eq!(scheduler.index().await, 0);
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scheduler.index().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_multiplier_applies_to_next_step() {
        let scheduler = scheduler(&plain_words(100));
        scheduler.set_speed_multiplier(0.5).await;
        scheduler.play().await;
        time::sleep(Duration::from_millis(390)).await;
        assert_eq!(scheduler.index().await, 0);
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(scheduler.index().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_snapshot_on_changes() {
        let scheduler = scheduler("one two");
        let mut rx = scheduler.events.subscribe();
        scheduler.play().await;
        match rx.recv().await.unwrap() {
            ReaderEvent::PlaybackChanged { snapshot } => {
                assert!(snapshot.is_playing);
                assert_eq!(snapshot.display_text, "one");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
