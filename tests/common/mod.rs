#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use sigscan_lib::{
    capture::{CaptureDevice, DeviceConstraints, DeviceStream, Frame},
    errors::DeviceError,
    models::{FeatureTag, ImageBuffer, ImageSource, ReferenceRecord},
    recognition::{Score, ScoreError, Scorer},
};
use tokio::sync::Semaphore;

pub const FRAME_WIDTH: u32 = 8;
pub const FRAME_HEIGHT: u32 = 4;

/// What the fake camera does for one `acquire` call.
pub enum Step {
    /// Grant a stream that delivers a frame.
    Grant,
    /// Grant a stream that never delivers a frame.
    GrantWithoutFrame,
    /// Grant a stream that ends before its first frame.
    FailWaitingForFrame,
    /// Grant a stream that stays silent until released.
    GrantNeverReady,
    Deny(DeviceError),
}

/// Counters shared between a fake camera, its streams and the test.
#[derive(Default)]
pub struct Tally {
    live: AtomicUsize,
    max_live: AtomicUsize,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
}

impl Tally {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn open(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
    }

    fn close(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted camera. Each `acquire` pops the next step (default: `Grant`).
/// A gated camera holds every request until the test opens the gate.
pub struct FakeDevice {
    plan: Mutex<VecDeque<Step>>,
    gate: Arc<Semaphore>,
    entered: Arc<Semaphore>,
    tally: Arc<Tally>,
}

impl FakeDevice {
    pub fn new(plan: Vec<Step>) -> Self {
        Self::with_gate(plan, Semaphore::MAX_PERMITS)
    }

    pub fn gated(plan: Vec<Step>) -> Self {
        Self::with_gate(plan, 0)
    }

    fn with_gate(plan: Vec<Step>, permits: usize) -> Self {
        Self {
            plan: Mutex::new(plan.into()),
            gate: Arc::new(Semaphore::new(permits)),
            entered: Arc::new(Semaphore::new(0)),
            tally: Arc::new(Tally::default()),
        }
    }

    pub fn tally(&self) -> Arc<Tally> {
        self.tally.clone()
    }

    pub fn controls(&self) -> Controls {
        Controls {
            gate: self.gate.clone(),
            entered: self.entered.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Controls {
    gate: Arc<Semaphore>,
    entered: Arc<Semaphore>,
}

impl Controls {
    /// Let `n` pending or future device requests complete.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Wait until the session has asked the device for a stream.
    pub async fn wait_for_request(&self) {
        let permit = tokio::time::timeout(Duration::from_secs(5), self.entered.acquire())
            .await
            .expect("device was never asked for a stream")
            .expect("semaphore closed");
        permit.forget();
    }
}

impl CaptureDevice for FakeDevice {
    type Stream = FakeStream;

    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<FakeStream, DeviceError> {
        assert!(!constraints.audio, "audio must never be requested");
        self.tally.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.entered.add_permits(1);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| DeviceError::Other("gate closed".into()))?;
        permit.forget();

        let step = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Grant);

        let (frame, readiness) = match step {
            Step::Deny(err) => return Err(err),
            Step::Grant => (Some(solid_frame()), Readiness::Ready),
            Step::GrantWithoutFrame => (None, Readiness::Ready),
            Step::FailWaitingForFrame => (None, Readiness::Fails),
            Step::GrantNeverReady => (None, Readiness::Never),
        };

        self.tally.open();
        Ok(FakeStream {
            frame,
            readiness,
            tally: self.tally.clone(),
        })
    }
}

#[derive(Clone, Copy)]
enum Readiness {
    Ready,
    Fails,
    Never,
}

pub struct FakeStream {
    frame: Option<Frame>,
    readiness: Readiness,
    tally: Arc<Tally>,
}

impl DeviceStream for FakeStream {
    async fn wait_ready(&mut self) -> Result<(), DeviceError> {
        match self.readiness {
            Readiness::Ready => Ok(()),
            Readiness::Fails => Err(DeviceError::Other("stream ended before first frame".into())),
            Readiness::Never => std::future::pending().await,
        }
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.frame.clone()
    }

    fn release(self) {
        self.tally.close();
    }
}

pub fn solid_frame() -> Frame {
    Frame {
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
        rgb: vec![200; (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize],
    }
}

/// Scores by reference label; unknown labels score 0.
pub struct FixedScorer {
    by_label: HashMap<String, f64>,
    fail_on: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            by_label: scores
                .iter()
                .map(|(label, score)| (label.to_string(), *score))
                .collect(),
            fail_on: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, label: &str) -> Self {
        self.fail_on = Some(label.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Scorer for FixedScorer {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn score(&self, _image: &ImageBuffer, reference: &ReferenceRecord) -> Result<Score, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_on.as_deref() == Some(reference.label.as_str()) {
            return Err(ScoreError::Internal(format!("cannot score {}", reference.label)));
        }
        let confidence = self.by_label.get(&reference.label).copied().unwrap_or(0.0);
        Ok(Score::new(
            confidence,
            BTreeSet::from([FeatureTag::StrokeWidth]),
        ))
    }
}

pub fn sample_image() -> ImageBuffer {
    ImageBuffer::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg", Some((8, 4)), ImageSource::Captured)
}

pub fn reference(label: &str) -> ReferenceRecord {
    ReferenceRecord {
        id: format!("ref-{label}"),
        label: label.to_string(),
        category: "General".to_string(),
        reference_image: sample_image(),
        created_at: Utc::now(),
    }
}

/// A small PNG with a dark stroke on a light background.
pub fn signature_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        if y == height / 2 || x == y {
            image::Rgb([20, 20, 20])
        } else {
            image::Rgb([240, 240, 240])
        }
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}
