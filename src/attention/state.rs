use serde::{Deserialize, Serialize};

use super::AttentionConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttentionState {
    Attentive,
    Inattentive,
}

impl Default for AttentionState {
    fn default() -> Self {
        AttentionState::Inattentive
    }
}

/// Lifecycle of a monitor, reported to the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "message")]
pub enum AttentionStatus {
    Idle,
    Running,
    Error(String),
}

/// One reading from a presence source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PresenceSample {
    pub detections: u32,
    pub max_area_ratio: f64,
}

impl PresenceSample {
    pub fn present(detections: u32, max_area_ratio: f64) -> Self {
        Self {
            detections,
            max_area_ratio,
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_valid(&self, min_area_ratio: f64) -> bool {
        self.detections > 0 && self.max_area_ratio >= min_area_ratio
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionTransition {
    pub state: AttentionState,
    pub meta: String,
}

/// Debounces raw presence samples into attentive/inattentive transitions.
///
/// Timestamps are milliseconds on a monotonic clock owned by the caller.
/// Losing attention needs `lost_ms` without a valid sample; regaining it
/// needs an unbroken run of valid samples spanning `recover_ms`.
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    lost_ms: u64,
    recover_ms: u64,
    min_area_ratio: f64,
    state: AttentionState,
    last_seen_at: u64,
    seen_streak_start: Option<u64>,
    has_seen_face: bool,
}

impl AttentionTracker {
    pub fn new(config: &AttentionConfig) -> Self {
        Self {
            lost_ms: config.lost_ms,
            recover_ms: config.recover_ms,
            min_area_ratio: config.min_face_area_ratio,
            state: AttentionState::Inattentive,
            last_seen_at: 0,
            seen_streak_start: None,
            has_seen_face: false,
        }
    }

    pub fn state(&self) -> AttentionState {
        self.state
    }

    pub fn has_seen_face(&self) -> bool {
        self.has_seen_face
    }

    pub fn reset(&mut self) {
        self.state = AttentionState::Inattentive;
        self.last_seen_at = 0;
        self.seen_streak_start = None;
        self.has_seen_face = false;
    }

    pub fn observe(
        &mut self,
        sample: PresenceSample,
        now: u64,
        label: &str,
    ) -> Option<AttentionTransition> {
        let meta = format!(
            "{label}:d={} a={:.3}",
            sample.detections, sample.max_area_ratio
        );

        if sample.is_valid(self.min_area_ratio) {
            let streak_start = *self.seen_streak_start.get_or_insert(now);
            self.has_seen_face = true;
            self.last_seen_at = now;
            if now.saturating_sub(streak_start) >= self.recover_ms {
                return self.transition(AttentionState::Attentive, meta);
            }
            return None;
        }

        self.seen_streak_start = None;

        if self.has_seen_face && now.saturating_sub(self.last_seen_at) > self.lost_ms {
            return self.transition(AttentionState::Inattentive, meta);
        }

        if !self.has_seen_face && now.saturating_sub(self.last_seen_at) > self.recover_ms {
            return self.transition(AttentionState::Inattentive, meta);
        }

        None
    }

    fn transition(&mut self, next: AttentionState, meta: String) -> Option<AttentionTransition> {
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(AttentionTransition { state: next, meta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> AttentionTracker {
        AttentionTracker::new(&AttentionConfig::default())
    }

    fn face() -> PresenceSample {
        PresenceSample::present(1, 0.1)
    }

    /// Feeds one sample every 100ms over `[from, to)` and collects transitions.
    fn feed(
        tracker: &mut AttentionTracker,
        sample: PresenceSample,
        from: u64,
        to: u64,
    ) -> Vec<(u64, AttentionState)> {
        (from..to)
            .step_by(100)
            .filter_map(|t| tracker.observe(sample, t, "test").map(|tr| (t, tr.state)))
            .collect()
    }

    #[test]
    fn continuous_presence_recovers_after_recover_ms() {
        let mut t = tracker();
        let transitions = feed(&mut t, face(), 0, 300);
        assert_eq!(transitions, vec![(200, AttentionState::Attentive)]);
    }

    #[test]
    fn isolated_sample_after_a_gap_does_not_recover() {
        let mut t = tracker();
        assert!(t.observe(face(), 0, "test").is_none());
        assert!(t.observe(PresenceSample::absent(), 100, "test").is_none());
        assert!(t.observe(face(), 300, "test").is_none());
        assert_eq!(t.state(), AttentionState::Inattentive);
        assert_eq!(
            t.observe(face(), 500, "test").map(|tr| tr.state),
            Some(AttentionState::Attentive)
        );
    }

    #[test]
    fn gap_longer_than_lost_ms_goes_inattentive() {
        let mut t = tracker();
        feed(&mut t, face(), 0, 300);
        let transitions = feed(&mut t, PresenceSample::absent(), 300, 1600);
        // last seen at 200; 1500 - 200 = 1300 > 1200
        assert_eq!(transitions, vec![(1500, AttentionState::Inattentive)]);
    }

    #[test]
    fn gap_within_lost_ms_stays_attentive() {
        let mut t = tracker();
        feed(&mut t, face(), 0, 300);
        let transitions = feed(&mut t, PresenceSample::absent(), 300, 1500);
        assert!(transitions.is_empty());
        assert_eq!(t.state(), AttentionState::Attentive);
        assert!(t.observe(face(), 1400, "test").is_none());
        assert_eq!(t.state(), AttentionState::Attentive);
    }

    #[test]
    fn tiny_detections_count_as_absent() {
        let mut t = tracker();
        let transitions = feed(&mut t, PresenceSample::present(1, 0.01), 0, 1000);
        assert!(transitions.is_empty());
        assert!(!t.has_seen_face());
    }

    #[test]
    fn transitions_are_emitted_once_per_change() {
        let mut t = tracker();
        let transitions = feed(&mut t, face(), 0, 2000);
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn startup_without_presence_stays_quiet() {
        let mut t = tracker();
        let transitions = feed(&mut t, PresenceSample::absent(), 0, 5000);
        assert!(transitions.is_empty());
        assert_eq!(t.state(), AttentionState::Inattentive);
    }

    #[test]
    fn meta_describes_the_sample() {
        let mut t = tracker();
        feed(&mut t, face(), 0, 200);
        let tr = t.observe(PresenceSample::present(2, 0.25), 200, "face-detector").unwrap();
        assert_eq!(tr.meta, "face-detector:d=2 a=0.250");
    }

    #[test]
    fn reset_forgets_history() {
        let mut t = tracker();
        feed(&mut t, face(), 0, 300);
        t.reset();
        assert_eq!(t.state(), AttentionState::Inattentive);
        assert!(!t.has_seen_face());
    }
}
