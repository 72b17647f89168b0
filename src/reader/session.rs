use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::attention::{
    AttentionController, AttentionMonitor, AttentionStatus, PresenceSource,
};
use crate::error::{CapabilityError, ReaderError, RemoteError};
use crate::events::{EventBus, ReaderEvent};
use crate::playback::{
    PlaybackScheduler, PlaybackSnapshot, PlaybackState, SkipDirection, WPM_STEP,
};
use crate::remote::{AiService, Comprehension, Goal, PacingRequest, Summary, SummaryRequest};
use crate::settings::ReaderSettings;
use crate::text::{clean_text, tokenize, units_from_chunks, DisplayUnit};

use super::ReaderCommand;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const NOTHING_TO_READ: &str = "No text to read.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartPacerStatus {
    pub enabled: bool,
    pub loading: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub opened_at: DateTime<Utc>,
    pub original_words: usize,
    pub reading_summary: bool,
}

#[derive(Default)]
struct TextState {
    /// Cleaned text as loaded; summaries are always made from this.
    original: String,
    /// Text currently being read: the original or its summary.
    current: String,
    words: Vec<DisplayUnit>,
    chunks: Option<Vec<DisplayUnit>>,
    summary: Option<Summary>,
    /// Bumped whenever the text or pacing preferences change so late pacing
    /// results can be recognised as stale.
    generation: u64,
    /// Bumped only by `load_text`; a summary made from older text is dropped.
    source_version: u64,
    smart_pacer_enabled: bool,
    smart_pacer_loading: bool,
    summary_loading: bool,
    comprehension: Comprehension,
    goal: Goal,
}

struct AttentionSlot {
    monitor: AttentionMonitor,
    controller: Option<(AttentionController, JoinHandle<()>)>,
}

/// One open reader: text, playback, smart features and attention tracking.
///
/// Failures in the optional features are reported as events and never stop
/// playback.
#[derive(Clone)]
pub struct ReaderSession {
    id: String,
    opened_at: DateTime<Utc>,
    settings: ReaderSettings,
    scheduler: PlaybackScheduler,
    events: EventBus,
    ai: Option<Arc<dyn AiService>>,
    text: Arc<Mutex<TextState>>,
    attention: Arc<Mutex<AttentionSlot>>,
}

impl ReaderSession {
    pub fn new(settings: ReaderSettings, ai: Option<Arc<dyn AiService>>) -> Self {
        let settings = settings.normalized();
        let events = EventBus::new();
        let state = PlaybackState::new(settings.wpm, settings.units_per_step, settings.font_size);
        let scheduler = PlaybackScheduler::new(state, events.clone());

        let text = TextState {
            smart_pacer_enabled: settings.smart_pacer_default,
            comprehension: settings.comprehension,
            goal: settings.goal,
            ..TextState::default()
        };

        Self {
            id: Uuid::new_v4().to_string(),
            opened_at: Utc::now(),
            attention: Arc::new(Mutex::new(AttentionSlot {
                monitor: AttentionMonitor::new(settings.attention.clone()),
                controller: None,
            })),
            settings,
            scheduler,
            events,
            ai,
            text: Arc::new(Mutex::new(text)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn info(&self) -> SessionInfo {
        let text = self.text.lock().await;
        SessionInfo {
            id: self.id.clone(),
            opened_at: self.opened_at,
            original_words: tokenize(&text.original).len(),
            reading_summary: text.summary.is_some(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.scheduler.get_snapshot().await
    }

    /// Cleans and tokenizes `raw`, replacing whatever was being read. Pacing
    /// is requested in the background when the smart pacer is on.
    pub async fn load_text(&self, raw: &str) -> Result<usize, ReaderError> {
        let cleaned = clean_text(raw);
        let mut text = self.text.lock().await;
        text.original = cleaned.clone();
        text.summary = None;
        text.source_version += 1;
        let count = self.replace_text(&mut text, cleaned).await;
        drop(text);
        self.forget_rewind().await;

        if count == 0 {
            self.events.notice(NOTHING_TO_READ);
            return Err(ReaderError::NothingToRead);
        }
        log_info!("session {}: loaded {count} words", self.id);
        Ok(count)
    }

    pub async fn play(&self) -> Result<(), ReaderError> {
        if self.scheduler.play().await {
            Ok(())
        } else {
            self.events.notice(NOTHING_TO_READ);
            Err(ReaderError::NothingToRead)
        }
    }

    pub async fn smart_pacer(&self) -> SmartPacerStatus {
        let text = self.text.lock().await;
        pacer_status(&text)
    }

    pub async fn summary(&self) -> Option<Summary> {
        self.text.lock().await.summary.clone()
    }

    pub async fn current_text(&self) -> String {
        self.text.lock().await.current.clone()
    }

    /// Enabling uses cached chunk data or fetches it; disabling goes back to
    /// word units at the same reading position.
    pub async fn toggle_smart_pacer(&self) -> bool {
        let mut text = self.text.lock().await;
        if text.smart_pacer_enabled {
            text.smart_pacer_enabled = false;
            if self.scheduler.get_state().await.chunked {
                self.switch_units(text.words.clone(), false).await;
            }
        } else {
            text.smart_pacer_enabled = true;
            match text.chunks.clone() {
                Some(chunks) => self.switch_units(chunks, true).await,
                None if !text.words.is_empty() => self.start_pacing_fetch(&mut text).await,
                None => {}
            }
        }
        let enabled = text.smart_pacer_enabled;
        self.emit_pacer(&text);
        log_info!("smart pacer {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// Changes what the pacer optimises for. Fresh pacing is requested when
    /// the pacer is on.
    pub async fn set_pacing_preferences(&self, comprehension: Comprehension, goal: Goal) {
        let mut text = self.text.lock().await;
        if text.comprehension == comprehension && text.goal == goal {
            return;
        }
        text.comprehension = comprehension;
        text.goal = goal;
        text.chunks = None;
        text.generation += 1;
        if text.smart_pacer_enabled && !text.words.is_empty() {
            self.start_pacing_fetch(&mut text).await;
        }
    }

    /// Summarizes the original text in the background. Returns `None` when a
    /// summary is already being produced or there is nothing to summarize.
    pub async fn request_summary(&self) -> Option<JoinHandle<()>> {
        let mut text = self.text.lock().await;
        if text.summary_loading {
            return None;
        }
        if text.original.is_empty() {
            self.events.notice(NOTHING_TO_READ);
            return None;
        }
        text.summary_loading = true;
        let request = SummaryRequest {
            text: text.original.clone(),
            summary_length: self.settings.summary_length,
        };
        let version = text.source_version;
        drop(text);

        self.events.notice("Summarizing text...");
        let session = self.clone();
        Some(tokio::spawn(async move { session.run_summary(request, version).await }))
    }

    /// Starts attention tracking. On failure a `TrackingError` event is
    /// emitted and playback carries on untracked.
    pub async fn start_tracking(
        &self,
        source: Box<dyn PresenceSource>,
    ) -> Result<(), CapabilityError> {
        let mut slot = self.attention.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let started = slot
            .monitor
            .start(source, move |transition| {
                let _ = tx.send(transition);
            })
            .await;

        if let Err(err) = started {
            if err != CapabilityError::AlreadyRunning {
                self.events.emit(ReaderEvent::TrackingError {
                    message: err.to_string(),
                });
            }
            return Err(err);
        }

        let controller = AttentionController::new(
            self.scheduler.clone(),
            self.events.clone(),
            self.settings.rewind_policy,
            self.settings.attention.clone(),
        );
        let task = controller.clone().spawn(rx);
        slot.controller = Some((controller, task));
        Ok(())
    }

    pub async fn stop_tracking(&self) {
        let mut slot = self.attention.lock().await;
        slot.monitor.stop().await;
        if let Some((controller, task)) = slot.controller.take() {
            if let Err(err) = task.await {
                log_error!("attention controller failed to join: {err:?}");
            }
            controller.reset().await;
        }
    }

    pub async fn tracking_status(&self) -> AttentionStatus {
        self.attention.lock().await.monitor.status().clone()
    }

    /// Stops playback and releases the presence source.
    pub async fn close(&self) {
        self.stop_tracking().await;
        self.scheduler.stop().await;
        log_info!("reader closed");
    }

    pub async fn handle_command(&self, command: ReaderCommand) {
        match command {
            ReaderCommand::TogglePlay => {
                if !self.scheduler.toggle_play().await && self.scheduler.is_empty().await {
                    self.events.notice(NOTHING_TO_READ);
                }
            }
            ReaderCommand::SkipForward => self.scheduler.skip(SkipDirection::Forward).await,
            ReaderCommand::SkipBackward => self.scheduler.skip(SkipDirection::Backward).await,
            ReaderCommand::WpmUp => self.scheduler.adjust_wpm(WPM_STEP).await,
            ReaderCommand::WpmDown => self.scheduler.adjust_wpm(-WPM_STEP).await,
            ReaderCommand::Restart => self.scheduler.stop().await,
            ReaderCommand::Close => self.close().await,
            ReaderCommand::ToggleSmartPacer => {
                self.toggle_smart_pacer().await;
            }
            ReaderCommand::Summarize => {
                self.request_summary().await;
            }
        }
    }

    /// Makes `next` the text being read from index 0, dropping chunk data
    /// that belonged to the previous text.
    async fn replace_text(&self, text: &mut TextState, next: String) -> usize {
        text.words = tokenize(&next);
        text.current = next;
        text.chunks = None;
        text.generation += 1;
        self.scheduler.load(text.words.clone(), false).await;

        if text.smart_pacer_enabled && !text.words.is_empty() {
            self.start_pacing_fetch(text).await;
        }
        text.words.len()
    }

    async fn pacing_request(&self, text: &TextState) -> PacingRequest {
        PacingRequest {
            text: text.current.clone(),
            user_wpm: self.scheduler.wpm().await,
            comprehension: text.comprehension,
            goal: text.goal,
        }
    }

    /// At most one pacing request is in flight; later callers are dropped
    /// and the running request re-checks the text when it returns.
    async fn start_pacing_fetch(&self, text: &mut TextState) {
        if text.smart_pacer_loading {
            return;
        }
        text.smart_pacer_loading = true;
        let request = self.pacing_request(text).await;
        let generation = text.generation;
        self.emit_pacer(text);

        let session = self.clone();
        tokio::spawn(async move { session.run_pacing_fetch(request, generation).await });
    }

    async fn run_pacing_fetch(self, mut request: PacingRequest, mut generation: u64) {
        loop {
            let result = match &self.ai {
                Some(ai) => ai.analyze_pacing(&request).await,
                None => Err(RemoteError::NotConfigured("SWIFTREAD_API_URL")),
            };

            let mut text = self.text.lock().await;
            if text.generation != generation {
                if text.smart_pacer_enabled && !text.words.is_empty() {
                    request = self.pacing_request(&text).await;
                    generation = text.generation;
                    continue;
                }
                text.smart_pacer_loading = false;
                self.emit_pacer(&text);
                return;
            }

            let units = result.and_then(|chunks| {
                let units = units_from_chunks(&chunks);
                if units.is_empty() {
                    Err(RemoteError::EmptyResult)
                } else {
                    Ok(units)
                }
            });

            match units {
                Ok(units) => {
                    log_info!("smart pacer returned {} chunks", units.len());
                    text.chunks = Some(units.clone());
                    if text.smart_pacer_enabled {
                        self.switch_units(units, true).await;
                    }
                }
                Err(err) => {
                    log_warn!("smart pacing unavailable: {err}");
                    text.chunks = None;
                    text.smart_pacer_enabled = false;
                    if self.scheduler.get_state().await.chunked {
                        self.switch_units(text.words.clone(), false).await;
                    }
                    self.events.notice(err.notice());
                }
            }

            text.smart_pacer_loading = false;
            self.emit_pacer(&text);
            return;
        }
    }

    async fn run_summary(self, request: SummaryRequest, version: u64) {
        let result = match &self.ai {
            Some(ai) => ai.summarize(&request).await,
            None => Err(RemoteError::NotConfigured("SWIFTREAD_API_URL")),
        };

        let mut text = self.text.lock().await;
        text.summary_loading = false;
        if text.source_version != version {
            log_info!("dropping summary of text that is no longer loaded");
            return;
        }

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                log_warn!("summary failed: {err}");
                self.events.notice(err.notice());
                return;
            }
        };

        let cleaned = clean_text(&summary.text);
        if tokenize(&cleaned).is_empty() {
            self.events.notice(RemoteError::EmptySummary.notice());
            return;
        }

        text.summary = Some(summary);
        let count = self.replace_text(&mut text, cleaned).await;
        drop(text);
        self.forget_rewind().await;
        log_info!("summary loaded: {count} words");
        self.events.notice("Summary ready");
    }

    /// A rewind recorded against the previous text means nothing in the new one.
    async fn forget_rewind(&self) {
        if let Some((controller, _)) = &self.attention.lock().await.controller {
            controller.reset().await;
        }
    }

    /// Swaps the unit sequence while keeping the reader at the same word.
    async fn switch_units(&self, units: Vec<DisplayUnit>, chunked: bool) {
        let state = self.scheduler.get_state().await;
        let word_offset = words_before(&state.units, state.index);
        let target = unit_at_word(&units, word_offset);
        self.scheduler
            .replace_units(units, chunked, target, state.is_playing)
            .await;
    }

    fn emit_pacer(&self, text: &TextState) {
        let status = pacer_status(text);
        self.events.emit(ReaderEvent::SmartPacerChanged {
            enabled: status.enabled,
            loading: status.loading,
        });
    }
}

fn pacer_status(text: &TextState) -> SmartPacerStatus {
    SmartPacerStatus {
        enabled: text.smart_pacer_enabled,
        loading: text.smart_pacer_loading,
    }
}

fn words_before(units: &[DisplayUnit], index: usize) -> usize {
    units
        .iter()
        .take(index)
        .map(DisplayUnit::word_count)
        .sum()
}

fn unit_at_word(units: &[DisplayUnit], word_offset: usize) -> usize {
    let mut seen = 0;
    for (i, unit) in units.iter().enumerate() {
        seen += unit.word_count();
        if seen > word_offset {
            return i;
        }
    }
    units.len()
}
