use serde::Serialize;
use tokio::sync::broadcast;

use crate::attention::AttentionState;
use crate::playback::PlaybackSnapshot;

const EVENT_CAPACITY: usize = 256;

/// Notifications for whatever renders the reader. Emission never blocks and
/// never fails the caller; lagging subscribers simply miss events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReaderEvent {
    #[serde(rename_all = "camelCase")]
    PlaybackChanged { snapshot: PlaybackSnapshot },
    #[serde(rename_all = "camelCase")]
    AttentionChanged { state: AttentionState, meta: String },
    #[serde(rename_all = "camelCase")]
    Rewound { from: usize, to: usize, units: usize },
    #[serde(rename_all = "camelCase")]
    SpeedChanged { multiplier: f64 },
    #[serde(rename_all = "camelCase")]
    SmartPacerChanged { enabled: bool, loading: bool },
    #[serde(rename_all = "camelCase")]
    Notice { message: String },
    #[serde(rename_all = "camelCase")]
    TrackingError { message: String },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ReaderEvent) {
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.emit(ReaderEvent::Notice {
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
