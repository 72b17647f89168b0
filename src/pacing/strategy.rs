use crate::text::tokenize::{DisplayUnit, MAX_AI_MULTIPLIER, MIN_AI_MULTIPLIER};

/// Source of the per-unit display multiplier applied to the base delay.
pub trait PacingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn multiplier(&self, unit: &DisplayUnit) -> f64;
}

/// Rule-based pacing from the shape of the displayed text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPacing;

impl HeuristicPacing {
    pub const LONG_WORD: usize = 8;
    pub const VERY_LONG_WORD: usize = 12;
    pub const LONG_WORD_BONUS: f64 = 0.3;
    pub const VERY_LONG_WORD_BONUS: f64 = 0.2;
    pub const SENTENCE_END_BONUS: f64 = 0.5;
    pub const CLAUSE_END_BONUS: f64 = 0.25;
    pub const DIGIT_BONUS: f64 = 0.2;
    pub const CAPITALIZED_BONUS: f64 = 0.1;
}

impl PacingStrategy for HeuristicPacing {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn multiplier(&self, unit: &DisplayUnit) -> f64 {
        let text = unit.text.as_str();
        let len = text.chars().count();
        let mut multiplier = 1.0;

        if len > Self::LONG_WORD {
            multiplier += Self::LONG_WORD_BONUS;
        }
        if len > Self::VERY_LONG_WORD {
            multiplier += Self::VERY_LONG_WORD_BONUS;
        }

        match text.chars().last() {
            Some('.' | '!' | '?') => multiplier += Self::SENTENCE_END_BONUS,
            Some(',' | ';' | ':') => multiplier += Self::CLAUSE_END_BONUS,
            _ => {}
        }

        if text.chars().any(|c| c.is_ascii_digit()) {
            multiplier += Self::DIGIT_BONUS;
        }

        let capitalized = text.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if capitalized && len > 1 {
            multiplier += Self::CAPITALIZED_BONUS;
        }

        multiplier
    }
}

/// Multiplier assigned by the smart pacer, clamped to the accepted range.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiPacing;

impl PacingStrategy for AiPacing {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn multiplier(&self, unit: &DisplayUnit) -> f64 {
        unit.multiplier
            .filter(|m| m.is_finite())
            .map(|m| m.clamp(MIN_AI_MULTIPLIER, MAX_AI_MULTIPLIER))
            .unwrap_or(1.0)
    }
}
