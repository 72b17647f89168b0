use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::Instant;

use crate::pacing::{PacingPolicy, MIN_SPEED_MULTIPLIER};
use crate::text::{split_orp, DisplayUnit, OrpSplit};

pub const WPM_RANGE: RangeInclusive<u32> = 50..=1500;
pub const UNITS_PER_STEP_RANGE: RangeInclusive<usize> = 1..=5;
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 16..=120;
pub const WPM_STEP: i32 = 25;
pub const MIN_SKIP: usize = 10;
pub const SKIP_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDirection {
    Forward,
    Backward,
}

/// A pending advance. `epoch` identifies it; any state change that cancels
/// the pending timer bumps the state's epoch so a late firing is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAdvance {
    pub epoch: u64,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Stale,
    Next(ScheduledAdvance),
    Finished,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub index: usize,
    pub total_units: usize,
    pub is_playing: bool,
    pub wpm: u32,
    pub units_per_step: usize,
    pub font_size: u32,
    pub speed_multiplier: f64,
    pub chunked: bool,
    pub display_text: String,
    pub orp: OrpSplit,
    pub progress_percent: f64,
    pub progress_label: String,
    pub time_left: String,
    pub total_time: String,
    pub read_elapsed_secs: Option<u64>,
    pub total_words: usize,
}

#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub units: Vec<DisplayUnit>,
    pub index: usize,
    pub is_playing: bool,
    pub speed_multiplier: f64,
    pub wpm: u32,
    pub units_per_step: usize,
    pub font_size: u32,
    /// Units came from the smart pacer; each chunk is one step.
    pub chunked: bool,
    pub read_elapsed_secs: Option<u64>,
    epoch: u64,
    read_anchor: Option<Instant>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            index: 0,
            is_playing: false,
            speed_multiplier: 1.0,
            wpm: 300,
            units_per_step: 1,
            font_size: 48,
            chunked: false,
            read_elapsed_secs: None,
            epoch: 0,
            read_anchor: None,
        }
    }
}

impl PlaybackState {
    pub fn new(wpm: u32, units_per_step: usize, font_size: u32) -> Self {
        Self {
            wpm: clamp_wpm(wpm),
            units_per_step: clamp_units_per_step(units_per_step),
            font_size: clamp_font_size(font_size),
            ..Self::default()
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.is_playing {
            PlaybackStatus::Playing
        } else if !self.units.is_empty() && self.index >= self.units.len() {
            PlaybackStatus::Finished
        } else if self.index == 0 {
            PlaybackStatus::Idle
        } else {
            PlaybackStatus::Paused
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replaces the unit sequence and returns to idle at index 0.
    pub fn load(&mut self, units: Vec<DisplayUnit>, chunked: bool) {
        self.cancel_pending();
        self.units = units;
        self.chunked = chunked;
        self.index = 0;
        self.is_playing = false;
        self.read_anchor = None;
        self.read_elapsed_secs = None;
    }

    /// Swaps in another rendering of the same text (words or chunks) at
    /// `index`. The reading-time anchor survives; playback is left paused.
    pub fn replace_units(&mut self, units: Vec<DisplayUnit>, chunked: bool, index: usize) {
        self.cancel_pending();
        self.index = index.min(units.len().saturating_sub(1));
        self.units = units;
        self.chunked = chunked;
        self.is_playing = false;
    }

    /// Words advanced per step: one chunk in chunk mode, otherwise the
    /// configured word group size.
    pub fn step_size(&self) -> usize {
        if self.chunked {
            1
        } else {
            self.units_per_step
        }
    }

    /// The unit shown for the current step. Word groups are joined so the
    /// heuristics see the whole group.
    pub fn current_step(&self) -> Option<DisplayUnit> {
        if self.index >= self.units.len() {
            return None;
        }
        if self.chunked {
            return self.units.get(self.index).cloned();
        }
        let end = (self.index + self.units_per_step).min(self.units.len());
        let text = self.units[self.index..end]
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Some(DisplayUnit::word(text))
    }

    pub fn display_text(&self) -> String {
        self.current_step().map(|u| u.text).unwrap_or_default()
    }

    pub fn play(&mut self, now: Instant) -> Option<ScheduledAdvance> {
        if self.units.is_empty() || self.is_playing {
            return None;
        }
        if self.index >= self.units.len() {
            self.index = 0;
            self.read_elapsed_secs = None;
        }
        if self.index == 0 {
            self.read_anchor = Some(now);
        }
        self.is_playing = true;
        self.schedule()
    }

    pub fn pause(&mut self) -> bool {
        if !self.is_playing {
            return false;
        }
        self.cancel_pending();
        self.is_playing = false;
        true
    }

    pub fn stop(&mut self) {
        self.cancel_pending();
        self.is_playing = false;
        self.index = 0;
        self.read_anchor = None;
        self.read_elapsed_secs = None;
    }

    /// Applies a fired advance. Advances from a cancelled schedule are stale.
    pub fn advance(&mut self, epoch: u64, now: Instant) -> AdvanceOutcome {
        if !self.is_playing || epoch != self.epoch {
            return AdvanceOutcome::Stale;
        }

        self.index = (self.index + self.step_size()).min(self.units.len());
        if self.index < self.units.len() {
            match self.schedule() {
                Some(next) => AdvanceOutcome::Next(next),
                None => AdvanceOutcome::Finished,
            }
        } else {
            self.finish(now);
            AdvanceOutcome::Finished
        }
    }

    /// Moves to `target`, clamped to the last unit. Returns a fresh schedule
    /// when playing; partial elapsed time of the interrupted step is dropped.
    pub fn seek(&mut self, target: i64) -> Option<ScheduledAdvance> {
        if self.units.is_empty() {
            return None;
        }
        let last = (self.units.len() - 1) as i64;
        self.index = target.clamp(0, last) as usize;
        if self.is_playing {
            self.schedule()
        } else {
            None
        }
    }

    pub fn seek_percent(&mut self, percent: f64) -> Option<ScheduledAdvance> {
        let percent = if percent.is_finite() { percent } else { 0.0 };
        let target = ((percent / 100.0) * self.units.len() as f64).floor() as i64;
        self.seek(target)
    }

    pub fn skip_size(&self) -> usize {
        MIN_SKIP.max((self.units.len() as f64 * SKIP_FRACTION).floor() as usize)
    }

    pub fn skip(&mut self, direction: SkipDirection) -> Option<ScheduledAdvance> {
        let size = self.skip_size() as i64;
        let current = self.index as i64;
        match direction {
            SkipDirection::Forward => self.seek(current + size),
            SkipDirection::Backward => self.seek(current - size),
        }
    }

    /// Changing the rate while playing restarts the current step at the new
    /// rate instead of waiting for the pending advance.
    pub fn set_wpm(&mut self, wpm: u32) -> Option<ScheduledAdvance> {
        let wpm = clamp_wpm(wpm);
        if wpm == self.wpm {
            return None;
        }
        self.wpm = wpm;
        self.reschedule_if_playing()
    }

    pub fn adjust_wpm(&mut self, delta: i32) -> Option<ScheduledAdvance> {
        let target = (self.wpm as i64 + delta as i64).max(0) as u32;
        self.set_wpm(target)
    }

    pub fn set_units_per_step(&mut self, units_per_step: usize) -> Option<ScheduledAdvance> {
        let units_per_step = clamp_units_per_step(units_per_step);
        if units_per_step == self.units_per_step {
            return None;
        }
        self.units_per_step = units_per_step;
        self.reschedule_if_playing()
    }

    pub fn set_font_size(&mut self, font_size: u32) {
        self.font_size = clamp_font_size(font_size);
    }

    /// Takes effect on the next scheduled advance.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) {
        self.speed_multiplier = if multiplier.is_finite() {
            multiplier.max(MIN_SPEED_MULTIPLIER)
        } else {
            1.0
        };
    }

    pub fn total_words(&self) -> usize {
        self.units.iter().map(DisplayUnit::word_count).sum()
    }

    pub fn remaining_words(&self) -> usize {
        self.units
            .iter()
            .skip(self.index)
            .map(DisplayUnit::word_count)
            .sum()
    }

    pub fn progress_percent(&self) -> f64 {
        if self.units.is_empty() {
            0.0
        } else {
            (self.index as f64 / self.units.len() as f64) * 100.0
        }
    }

    pub fn progress_label(&self) -> String {
        let kind = if self.chunked { "chunks" } else { "words" };
        format!("{} / {} {}", self.index, self.units.len(), kind)
    }

    pub fn seconds_left(&self) -> f64 {
        (self.remaining_words() as f64 / f64::from(self.wpm.max(1))) * 60.0
    }

    pub fn total_seconds(&self) -> f64 {
        (self.total_words() as f64 / f64::from(self.wpm.max(1))) * 60.0
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let display_text = self.display_text();
        PlaybackSnapshot {
            status: self.status(),
            index: self.index,
            total_units: self.units.len(),
            is_playing: self.is_playing,
            wpm: self.wpm,
            units_per_step: self.units_per_step,
            font_size: self.font_size,
            speed_multiplier: self.speed_multiplier,
            chunked: self.chunked,
            orp: split_orp(&display_text),
            display_text,
            progress_percent: self.progress_percent(),
            progress_label: self.progress_label(),
            time_left: format_reading_time(self.seconds_left()),
            total_time: format_reading_time(self.total_seconds()),
            read_elapsed_secs: self.read_elapsed_secs,
            total_words: self.total_words(),
        }
    }

    fn schedule(&mut self) -> Option<ScheduledAdvance> {
        self.epoch = self.epoch.wrapping_add(1);
        let unit = self.current_step()?;
        let delay = PacingPolicy::delay(&unit, self.wpm, self.step_size(), self.speed_multiplier);
        Some(ScheduledAdvance {
            epoch: self.epoch,
            delay,
        })
    }

    fn reschedule_if_playing(&mut self) -> Option<ScheduledAdvance> {
        if self.is_playing {
            self.schedule()
        } else {
            None
        }
    }

    fn cancel_pending(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn finish(&mut self, now: Instant) {
        self.cancel_pending();
        self.is_playing = false;
        self.index = self.units.len();
        if let Some(anchor) = self.read_anchor.take() {
            let elapsed = now.saturating_duration_since(anchor);
            self.read_elapsed_secs = Some(elapsed.as_secs_f64().round() as u64);
        }
    }
}

pub fn clamp_wpm(wpm: u32) -> u32 {
    wpm.clamp(*WPM_RANGE.start(), *WPM_RANGE.end())
}

pub fn clamp_units_per_step(units_per_step: usize) -> usize {
    units_per_step.clamp(*UNITS_PER_STEP_RANGE.start(), *UNITS_PER_STEP_RANGE.end())
}

pub fn clamp_font_size(font_size: u32) -> u32 {
    font_size.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end())
}

/// `45s`, `2m`, `2m 5s`. Seconds round up.
pub fn format_reading_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    if seconds < 60.0 {
        return format!("{}s", seconds.ceil() as u64);
    }
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).ceil() as u64;
    if secs > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{mins}m")
    }
}
