use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::CapabilityError;

use super::{
    AttentionConfig, AttentionStatus, AttentionTracker, AttentionTransition, PresenceSample,
    PresenceSource,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Runs a presence source on a fixed cadence and reports debounced
/// attention transitions.
pub struct AttentionMonitor {
    config: AttentionConfig,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    status: AttentionStatus,
}

impl AttentionMonitor {
    pub fn new(config: AttentionConfig) -> Self {
        Self {
            config,
            handle: None,
            cancel_token: None,
            status: AttentionStatus::Idle,
        }
    }

    pub fn status(&self) -> &AttentionStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Acquires the source and starts sampling. `on_change` is called from the
    /// sampling task once per transition, never after `stop` returns.
    ///
    /// On failure the source is released and the monitor stays stopped.
    pub async fn start<F>(
        &mut self,
        mut source: Box<dyn PresenceSource>,
        on_change: F,
    ) -> Result<(), CapabilityError>
    where
        F: FnMut(AttentionTransition) + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(CapabilityError::AlreadyRunning);
        }

        if let Err(err) = source.acquire().await {
            source.release().await;
            log_warn!("attention source {} unavailable: {err}", source.label());
            self.status = AttentionStatus::Error(err.to_string());
            return Err(err);
        }

        log_info!("attention tracking started ({})", source.label());

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            source,
            self.config.clone(),
            cancel_token.clone(),
            on_change,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.status = AttentionStatus::Running;
        Ok(())
    }

    /// Cancels sampling and waits for the loop to release its source.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log_error!("attention loop failed to join: {err:?}");
            }
        }

        if self.status == AttentionStatus::Running {
            self.status = AttentionStatus::Idle;
        }
    }
}

async fn sampling_loop<F>(
    mut source: Box<dyn PresenceSource>,
    config: AttentionConfig,
    cancel_token: CancellationToken,
    mut on_change: F,
) where
    F: FnMut(AttentionTransition) + Send + 'static,
{
    let mut ticker = time::interval(config.sample_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let sample_timeout = config.sample_timeout();
    let mut tracker = AttentionTracker::new(&config);
    let origin = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // One sample at a time; a slow detector delays the next tick instead
        // of stacking calls.
        let sample = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            result = time::timeout(sample_timeout, source.sample()) => match result {
                Ok(Ok(sample)) => sample,
                Ok(Err(err)) => {
                    log_debug!("{err}");
                    PresenceSample::absent()
                }
                Err(_) => {
                    log_debug!("presence sample timed out after {sample_timeout:?}");
                    PresenceSample::absent()
                }
            },
        };

        let now_ms = u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Some(transition) = tracker.observe(sample, now_ms, source.label()) {
            log_info!("attention -> {:?} ({})", transition.state, transition.meta);
            on_change(transition);
        }
    }

    source.release().await;
    log_info!("attention loop shutting down ({})", source.label());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attention::backend::fakes::ScriptedPresence;
    use crate::attention::AttentionState;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recorder() -> (
        Arc<Mutex<Vec<AttentionState>>>,
        impl FnMut(AttentionTransition) + Send + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |t: AttentionTransition| {
            sink.lock().unwrap().push(t.state)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn reports_away_and_back() {
        let source = ScriptedPresence::new();
        let present = source.present.clone();
        present.store(true, Ordering::SeqCst);

        let (seen, on_change) = recorder();
        let mut monitor = AttentionMonitor::new(AttentionConfig::default());
        monitor.start(Box::new(source), on_change).await.unwrap();
        assert_eq!(monitor.status(), &AttentionStatus::Running);

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec![AttentionState::Attentive]);

        present.store(false, Ordering::SeqCst);
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![AttentionState::Attentive, AttentionState::Inattentive]
        );

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_source_is_released_and_reported() {
        let mut source = ScriptedPresence::new();
        source.refuse = Some(CapabilityError::PermissionDenied("camera".into()));
        let released = source.released.clone();

        let (_, on_change) = recorder();
        let mut monitor = AttentionMonitor::new(AttentionConfig::default());
        let err = monitor.start(Box::new(source), on_change).await.unwrap_err();

        assert!(matches!(err, CapabilityError::PermissionDenied(_)));
        assert!(released.load(Ordering::SeqCst));
        assert!(!monitor.is_running());
        assert!(matches!(monitor.status(), AttentionStatus::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn sample_errors_count_as_absence() {
        let source = ScriptedPresence::new();
        source.present.store(true, Ordering::SeqCst);
        let fail = source.fail_samples.clone();

        let (seen, on_change) = recorder();
        let mut monitor = AttentionMonitor::new(AttentionConfig::default());
        monitor.start(Box::new(source), on_change).await.unwrap();

        time::sleep(Duration::from_millis(250)).await;
        fail.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![AttentionState::Attentive, AttentionState::Inattentive]
        );
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_releases_and_silences() {
        let source = ScriptedPresence::new();
        let released = source.released.clone();
        let samples = source.samples.clone();
        let present = source.present.clone();

        let (seen, on_change) = recorder();
        let mut monitor = AttentionMonitor::new(AttentionConfig::default());
        monitor.start(Box::new(source), on_change).await.unwrap();
        time::sleep(Duration::from_millis(150)).await;
        monitor.stop().await;

        assert!(released.load(Ordering::SeqCst));
        assert_eq!(monitor.status(), &AttentionStatus::Idle);

        let taken = samples.load(Ordering::SeqCst);
        present.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(samples.load(Ordering::SeqCst), taken);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected() {
        let (_, first) = recorder();
        let (_, second) = recorder();
        let mut monitor = AttentionMonitor::new(AttentionConfig::default());
        monitor
            .start(Box::new(ScriptedPresence::new()), first)
            .await
            .unwrap();
        let err = monitor
            .start(Box::new(ScriptedPresence::new()), second)
            .await
            .unwrap_err();
        assert_eq!(err, CapabilityError::AlreadyRunning);
        monitor.stop().await;
    }
}
