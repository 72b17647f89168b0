use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::events::{EventBus, ReaderEvent};
use crate::playback::PlaybackScheduler;

use super::{AttentionConfig, AttentionState, AttentionTransition};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// How far playback jumps back when the reader returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RewindPolicy {
    Fixed(usize),
    /// One unit per 200 wpm, between 1 and 6.
    WpmScaled,
}

impl Default for RewindPolicy {
    fn default() -> Self {
        RewindPolicy::Fixed(10)
    }
}

impl RewindPolicy {
    pub fn units(&self, wpm: u32) -> usize {
        match *self {
            RewindPolicy::Fixed(units) => units,
            RewindPolicy::WpmScaled => ((f64::from(wpm) / 200.0).round() as usize).clamp(1, 6),
        }
    }
}

/// Captured when attention is lost; consumed exactly once when it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindContext {
    pub base_index: usize,
    pub rewind_units: usize,
    pub was_playing_before_away: bool,
}

/// Turns attention transitions into pause / rewind / ramp-up on playback.
#[derive(Clone)]
pub struct AttentionController {
    scheduler: PlaybackScheduler,
    events: EventBus,
    policy: RewindPolicy,
    config: AttentionConfig,
    rewind: Arc<Mutex<Option<RewindContext>>>,
    ramp: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AttentionController {
    pub fn new(
        scheduler: PlaybackScheduler,
        events: EventBus,
        policy: RewindPolicy,
        config: AttentionConfig,
    ) -> Self {
        Self {
            scheduler,
            events,
            policy,
            config,
            rewind: Arc::new(Mutex::new(None)),
            ramp: Arc::new(Mutex::new(None)),
        }
    }

    /// Consumes transitions until the sender side is dropped.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<AttentionTransition>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(transition) = rx.recv().await {
                self.handle(transition).await;
            }
            log_debug!("attention controller channel closed");
        })
    }

    pub async fn handle(&self, transition: AttentionTransition) {
        self.events.emit(ReaderEvent::AttentionChanged {
            state: transition.state,
            meta: transition.meta,
        });

        match transition.state {
            AttentionState::Inattentive => self.on_away().await,
            AttentionState::Attentive => self.on_back().await,
        }
    }

    pub async fn pending_rewind(&self) -> Option<RewindContext> {
        *self.rewind.lock().await
    }

    /// Stops any ramp in progress and forgets a pending rewind. Speed is
    /// restored to normal.
    pub async fn reset(&self) {
        self.cancel_ramp().await;
        self.rewind.lock().await.take();
        self.set_speed(1.0).await;
    }

    async fn on_away(&self) {
        self.cancel_ramp().await;

        let mut rewind = self.rewind.lock().await;
        if rewind.is_some() {
            return;
        }

        let state = self.scheduler.get_state().await;
        let context = RewindContext {
            base_index: state.index,
            rewind_units: self.policy.units(state.wpm),
            was_playing_before_away: state.is_playing,
        };
        *rewind = Some(context);
        drop(rewind);

        if context.was_playing_before_away {
            self.scheduler.pause().await;
        }
        log_info!(
            "reader away at index {} (playing: {})",
            context.base_index,
            context.was_playing_before_away
        );
    }

    async fn on_back(&self) {
        let Some(context) = self.rewind.lock().await.take() else {
            return;
        };

        let target = context.base_index.saturating_sub(context.rewind_units);
        self.scheduler.seek(target as i64).await;
        self.events.emit(ReaderEvent::Rewound {
            from: context.base_index,
            to: target,
            units: context.rewind_units,
        });

        self.set_speed(self.config.ramp_start).await;

        if context.was_playing_before_away {
            self.scheduler.play().await;
        }
        log_info!(
            "reader back: rewound {} -> {target}, ramping from {}",
            context.base_index,
            self.config.ramp_start
        );

        self.start_ramp().await;
    }

    async fn start_ramp(&self) {
        let mut ramp = self.ramp.lock().await;
        if let Some(handle) = ramp.take() {
            handle.abort();
        }

        let controller = self.clone();
        let start = self.config.ramp_start;
        let step = self.config.ramp_step;
        let period = self.config.ramp_interval();

        *ramp = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut steps: u32 = 0;
            loop {
                ticker.tick().await;
                steps += 1;
                let speed = (start + step * f64::from(steps)).min(1.0);
                controller.set_speed(speed).await;
                if speed >= 1.0 || step <= 0.0 {
                    break;
                }
            }
            log_debug!("ramp finished after {steps} steps");
        }));
    }

    async fn cancel_ramp(&self) {
        if let Some(handle) = self.ramp.lock().await.take() {
            handle.abort();
        }
    }

    async fn set_speed(&self, multiplier: f64) {
        self.scheduler.set_speed_multiplier(multiplier).await;
        self.events
            .emit(ReaderEvent::SpeedChanged { multiplier });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackState;
    use crate::text::tokenize;
    use std::time::Duration;

    fn setup(words: usize) -> (PlaybackScheduler, AttentionController) {
        let mut state = PlaybackState::new(300, 1, 48);
        state.load(tokenize(&vec!["word"; words].join(" ")), false);
        let events = EventBus::new();
        let scheduler = PlaybackScheduler::new(state, events.clone());
        let controller = AttentionController::new(
            scheduler.clone(),
            events,
            RewindPolicy::default(),
            AttentionConfig::default(),
        );
        (scheduler, controller)
    }

    fn transition(state: AttentionState) -> AttentionTransition {
        AttentionTransition {
            state,
            meta: "test:d=0 a=0.000".into(),
        }
    }

    #[test]
    fn wpm_scaled_rewind_is_bounded() {
        assert_eq!(RewindPolicy::WpmScaled.units(50), 1);
        assert_eq!(RewindPolicy::WpmScaled.units(300), 2);
        assert_eq!(RewindPolicy::WpmScaled.units(1500), 6);
        assert_eq!(RewindPolicy::Fixed(10).units(1500), 10);
    }

    #[test]
    fn policy_round_trips_through_settings_json() {
        let json = serde_json::to_string(&RewindPolicy::Fixed(4)).unwrap();
        assert_eq!(json, r#"{"fixed":4}"#);
        let back: RewindPolicy = serde_json::from_str(r#""wpmScaled""#).unwrap();
        assert_eq!(back, RewindPolicy::WpmScaled);
    }

    #[tokio::test(start_paused = true)]
    async fn look_away_and_return_rewinds_and_ramps() {
        let (scheduler, controller) = setup(200);
        scheduler.seek(42).await;
        scheduler.play().await;

        controller.handle(transition(AttentionState::Inattentive)).await;
        assert!(!scheduler.is_playing().await);
        assert_eq!(scheduler.index().await, 42);
        assert_eq!(
            controller.pending_rewind().await,
            Some(RewindContext {
                base_index: 42,
                rewind_units: 10,
                was_playing_before_away: true,
            })
        );

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(scheduler.index().await, 42);

        controller.handle(transition(AttentionState::Attentive)).await;
        assert_eq!(scheduler.index().await, 32);
        assert!(scheduler.is_playing().await);
        assert_eq!(scheduler.speed_multiplier().await, 0.5);
        assert!(controller.pending_rewind().await.is_none());

        time::sleep(Duration::from_millis(460)).await;
        assert!((scheduler.speed_multiplier().await - 0.6).abs() < 1e-9);

        time::sleep(Duration::from_millis(450 * 5)).await;
        assert_eq!(scheduler.speed_multiplier().await, 1.0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(scheduler.speed_multiplier().await, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_return_rewinds_once() {
        let (scheduler, controller) = setup(200);
        scheduler.seek(42).await;

        controller.handle(transition(AttentionState::Inattentive)).await;
        controller.handle(transition(AttentionState::Attentive)).await;
        controller.handle(transition(AttentionState::Attentive)).await;

        assert_eq!(scheduler.index().await, 32);
        assert!(!scheduler.is_playing().await);
    }

    #[tokio::test(start_paused = true)]
    async fn rewind_clamps_at_start() {
        let (scheduler, controller) = setup(50);
        scheduler.seek(3).await;
        controller.handle(transition(AttentionState::Inattentive)).await;
        controller.handle(transition(AttentionState::Attentive)).await;
        assert_eq!(scheduler.index().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn return_without_away_does_nothing() {
        let (scheduler, controller) = setup(50);
        scheduler.seek(20).await;
        controller.handle(transition(AttentionState::Attentive)).await;
        assert_eq!(scheduler.index().await, 20);
        assert_eq!(scheduler.speed_multiplier().await, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_rewound_event() {
        let (scheduler, controller) = setup(50);
        let mut rx = controller.events.subscribe();
        scheduler.seek(15).await;
        controller.handle(transition(AttentionState::Inattentive)).await;
        controller.handle(transition(AttentionState::Attentive)).await;

        let mut rewound = None;
        while let Ok(event) = rx.try_recv() {
            if let ReaderEvent::Rewound { from, to, units } = event {
                rewound = Some((from, to, units));
            }
        }
        assert_eq!(rewound, Some((15, 5, 10)));
    }

    #[tokio::test(start_paused = true)]
    async fn channel_driven_controller_applies_transitions() {
        let (scheduler, controller) = setup(50);
        scheduler.seek(25).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let task = controller.spawn(rx);

        tx.send(transition(AttentionState::Inattentive)).unwrap();
        tx.send(transition(AttentionState::Attentive)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(scheduler.index().await, 15);
    }
}
