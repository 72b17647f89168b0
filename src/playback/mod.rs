pub mod controller;
pub mod state;

pub use controller::PlaybackScheduler;
pub use state::{
    clamp_font_size, clamp_units_per_step, clamp_wpm, format_reading_time, AdvanceOutcome,
    PlaybackSnapshot, PlaybackState, PlaybackStatus, ScheduledAdvance, SkipDirection, WPM_STEP,
};
