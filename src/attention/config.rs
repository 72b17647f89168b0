use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable thresholds for presence sampling, hysteresis and ramp-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttentionConfig {
    /// Absence longer than this after being attentive flips to inattentive.
    pub lost_ms: u64,

    /// Continuous presence needed before flipping back to attentive.
    pub recover_ms: u64,

    /// Upper bound on presence samples per second.
    pub max_fps: u32,

    /// Detections smaller than this fraction of the frame are ignored.
    pub min_face_area_ratio: f64,

    /// Activity backend: idle time that counts as looking away.
    pub inactivity_ms: u64,

    /// A detection call slower than this counts as an empty frame.
    pub sample_timeout_ms: u64,

    /// Ramp-up after a rewind: speed starts at `ramp_start` and grows by
    /// `ramp_step` every `ramp_interval_ms` until it reaches 1.0.
    pub ramp_interval_ms: u64,
    pub ramp_step: f64,
    pub ramp_start: f64,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            lost_ms: 1200,
            recover_ms: 200,
            max_fps: 10,
            min_face_area_ratio: 0.02,
            inactivity_ms: 3000,
            sample_timeout_ms: 1000,
            ramp_interval_ms: 450,
            ramp_step: 0.1,
            ramp_start: 0.5,
        }
    }
}

impl AttentionConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.max_fps.max(1)))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms.max(1))
    }

    pub fn ramp_interval(&self) -> Duration {
        Duration::from_millis(self.ramp_interval_ms.max(1))
    }
}
