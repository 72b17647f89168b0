use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{CapabilityError, SampleError};

use super::{AttentionConfig, PresenceSample};

/// Something that can tell whether the reader is present right now.
///
/// `acquire` grabs the underlying capability (camera, input hooks) and may be
/// refused. `release` must be safe to call after a failed or partial acquire.
#[async_trait]
pub trait PresenceSource: Send {
    fn label(&self) -> &'static str;

    async fn acquire(&mut self) -> Result<(), CapabilityError>;

    async fn sample(&mut self) -> Result<PresenceSample, SampleError>;

    async fn release(&mut self);
}

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

/// Bounding box of a detected face, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub width: f64,
    pub height: f64,
}

#[async_trait]
pub trait Camera: Send {
    async fn open(&mut self) -> Result<(), CapabilityError>;

    /// The most recent frame, or `None` while the stream is not producing.
    async fn frame(&mut self) -> Option<VideoFrame>;

    async fn close(&mut self);
}

#[async_trait]
pub trait FaceDetector: Send {
    async fn load(&mut self) -> Result<(), CapabilityError>;

    async fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceBox>, SampleError>;
}

/// Camera + face detector presence source.
pub struct FacePresence<C, D> {
    camera: C,
    detector: D,
    min_area_ratio: f64,
    camera_open: bool,
}

impl<C: Camera, D: FaceDetector> FacePresence<C, D> {
    pub fn new(camera: C, detector: D, config: &AttentionConfig) -> Self {
        Self {
            camera,
            detector,
            min_area_ratio: config.min_face_area_ratio,
            camera_open: false,
        }
    }
}

#[async_trait]
impl<C: Camera, D: FaceDetector> PresenceSource for FacePresence<C, D> {
    fn label(&self) -> &'static str {
        "face-detector"
    }

    async fn acquire(&mut self) -> Result<(), CapabilityError> {
        self.camera.open().await?;
        self.camera_open = true;
        self.detector.load().await
    }

    async fn sample(&mut self) -> Result<PresenceSample, SampleError> {
        let Some(frame) = self.camera.frame().await else {
            return Ok(PresenceSample::absent());
        };
        if frame.width == 0 || frame.height == 0 {
            return Ok(PresenceSample::absent());
        }

        let frame_area = f64::from(frame.width) * f64::from(frame.height);
        let faces = self.detector.detect(&frame).await?;

        let mut sample = PresenceSample::absent();
        for face in faces {
            let ratio = (face.width * face.height) / frame_area;
            if ratio < self.min_area_ratio {
                continue;
            }
            sample.detections += 1;
            sample.max_area_ratio = sample.max_area_ratio.max(ratio);
        }
        Ok(sample)
    }

    async fn release(&mut self) {
        if self.camera_open {
            self.camera.close().await;
            self.camera_open = false;
        }
    }
}

/// Input activity shared between whoever observes the user and the
/// activity presence source.
#[derive(Debug, Clone)]
pub struct ActivitySignal {
    inner: Arc<ActivityInner>,
}

#[derive(Debug)]
struct ActivityInner {
    origin: Instant,
    last_activity_ms: AtomicU64,
    hidden: AtomicBool,
}

impl ActivitySignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ActivityInner {
                origin: Instant::now(),
                last_activity_ms: AtomicU64::new(0),
                hidden: AtomicBool::new(false),
            }),
        }
    }

    /// Any input event: pointer, key, scroll, touch, focus.
    pub fn record_activity(&self) {
        let now = self.elapsed_ms();
        self.inner.last_activity_ms.store(now, Ordering::Relaxed);
    }

    /// The reading surface was hidden or shown.
    pub fn set_hidden(&self, hidden: bool) {
        self.inner.hidden.store(hidden, Ordering::Relaxed);
        if !hidden {
            self.record_activity();
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.load(Ordering::Relaxed)
    }

    pub fn idle_ms(&self) -> u64 {
        let last = self.inner.last_activity_ms.load(Ordering::Relaxed);
        self.elapsed_ms().saturating_sub(last)
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.inner.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ActivitySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Presence inferred from recent input activity. Needs no capability, so
/// acquiring always succeeds.
pub struct ActivityPresence {
    signal: ActivitySignal,
    inactivity_ms: u64,
}

impl ActivityPresence {
    pub fn new(signal: ActivitySignal, config: &AttentionConfig) -> Self {
        Self {
            signal,
            inactivity_ms: config.inactivity_ms,
        }
    }
}

#[async_trait]
impl PresenceSource for ActivityPresence {
    fn label(&self) -> &'static str {
        "activity"
    }

    async fn acquire(&mut self) -> Result<(), CapabilityError> {
        self.signal.record_activity();
        Ok(())
    }

    async fn sample(&mut self) -> Result<PresenceSample, SampleError> {
        if self.signal.is_hidden() || self.signal.idle_ms() > self.inactivity_ms {
            return Ok(PresenceSample::absent());
        }
        Ok(PresenceSample::present(1, 1.0))
    }

    async fn release(&mut self) {}
}
