mod backend;
mod config;
mod controller;
mod monitor;
mod state;

pub use backend::{
    ActivityPresence, ActivitySignal, Camera, FaceBox, FaceDetector, FacePresence, PresenceSource,
    VideoFrame,
};
pub use config::AttentionConfig;
pub use controller::{AttentionController, RewindContext, RewindPolicy};
pub use monitor::AttentionMonitor;
pub use state::{
    AttentionState, AttentionStatus, AttentionTracker, AttentionTransition, PresenceSample,
};

#[cfg(test)]
pub(crate) use backend::fakes;
