pub mod strategy;

use std::time::Duration;

pub use strategy::{AiPacing, HeuristicPacing, PacingStrategy};

use crate::text::DisplayUnit;

pub const MIN_SPEED_MULTIPLIER: f64 = 0.1;

static HEURISTIC: HeuristicPacing = HeuristicPacing;
static AI: AiPacing = AiPacing;

/// Computes how long a display step stays on screen.
///
/// The strategy is chosen per unit: an AI-assigned multiplier wins, anything
/// else is paced by the heuristic rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacingPolicy;

impl PacingPolicy {
    pub fn strategy_for(unit: &DisplayUnit) -> &'static dyn PacingStrategy {
        match unit.multiplier {
            Some(m) if m.is_finite() => &AI,
            _ => &HEURISTIC,
        }
    }

    /// Milliseconds per step at `wpm`, before any multiplier.
    pub fn base_delay_ms(wpm: u32, units_per_step: usize) -> f64 {
        (60_000.0 / f64::from(wpm.max(1))) * units_per_step.max(1) as f64
    }

    pub fn delay_ms(
        unit: &DisplayUnit,
        wpm: u32,
        units_per_step: usize,
        speed_multiplier: f64,
    ) -> f64 {
        let speed = if speed_multiplier.is_finite() {
            speed_multiplier.max(MIN_SPEED_MULTIPLIER)
        } else {
            1.0
        };
        let multiplier = Self::strategy_for(unit).multiplier(unit);
        Self::base_delay_ms(wpm, units_per_step) * multiplier / speed
    }

    pub fn delay(
        unit: &DisplayUnit,
        wpm: u32,
        units_per_step: usize,
        speed_multiplier: f64,
    ) -> Duration {
        let ms = Self::delay_ms(unit, wpm, units_per_step, speed_multiplier);
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    }
}
