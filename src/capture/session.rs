use std::{sync::Arc, time::Duration};

use image::{codecs::jpeg::JpegEncoder, RgbImage};
use tokio::{
    sync::{mpsc, watch, Mutex},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{DeviceError, ScanError},
    models::{ImageBuffer, ImageSource},
};

use super::{
    device::{CaptureDevice, DeviceConstraints, DeviceStream, Frame},
    state::{CapturePhase, CaptureState},
};

// Set to false to silence transition logging for capture sessions
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    StateChanged(CaptureState),
    /// Emitted exactly once per successful `capture()`.
    Captured(ImageBuffer),
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub constraints: DeviceConstraints,
    pub jpeg_quality: u8,
    /// Bound on each of: the device request, and the wait for a first frame.
    pub acquire_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            constraints: DeviceConstraints::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

struct SessionInner<S: DeviceStream> {
    state: CaptureState,
    /// Present exactly when `state.phase == Streaming`.
    stream: Option<S>,
    /// Bumped by every `start()` and by cancelling an acquisition, so a late
    /// acquisition can tell it was superseded.
    generation: u64,
    /// Interrupts the in-flight acquisition, including its first-frame wait.
    cancel: Option<CancellationToken>,
}

impl<S: DeviceStream> Drop for SessionInner<S> {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(stream) = self.stream.take() {
            log::debug!("Releasing camera held by dropped capture session");
            stream.release();
        }
    }
}

/// Drives one camera through acquire, preview, single-shot capture and
/// teardown.
///
/// Acquisitions run on spawned tasks and are chained: each waits for its
/// predecessor to finish (adopting or releasing its handle) before it asks the
/// device for a new one, so at most one handle exists at a time.
pub struct CaptureSession<D: CaptureDevice> {
    device: Arc<D>,
    options: Arc<CaptureOptions>,
    inner: Arc<Mutex<SessionInner<D::Stream>>>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    /// Completion flag of the most recently spawned acquisition.
    last_acquisition: Arc<Mutex<Option<watch::Receiver<bool>>>>,
}

impl<D: CaptureDevice> Clone for CaptureSession<D> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            options: self.options.clone(),
            inner: self.inner.clone(),
            events: self.events.clone(),
            last_acquisition: self.last_acquisition.clone(),
        }
    }
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D, options: CaptureOptions) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            device: Arc::new(device),
            options: Arc::new(options),
            inner: Arc::new(Mutex::new(SessionInner {
                state: CaptureState::new(),
                stream: None,
                generation: 0,
                cancel: None,
            })),
            events,
            last_acquisition: Arc::new(Mutex::new(None)),
        };
        (session, receiver)
    }

    pub async fn state(&self) -> CaptureState {
        self.inner.lock().await.state.clone()
    }

    pub async fn holds_device(&self) -> bool {
        self.inner.lock().await.stream.is_some()
    }

    /// Begin acquiring the camera. Allowed from every phase; a handle that is
    /// still held is released first.
    pub async fn start(&self) {
        let mut last_acquisition = self.last_acquisition.lock().await;

        let (generation, token) = {
            let mut inner = self.inner.lock().await;
            if let Some(stream) = inner.stream.take() {
                log_info!("Releasing camera before starting a new acquisition");
                stream.release();
            }
            if let Some(previous) = inner.cancel.take() {
                log_info!("Superseding in-flight acquisition {}", inner.generation);
                previous.cancel();
            }
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            inner.generation = inner.generation.wrapping_add(1);
            inner.state.begin_acquiring();
            emit_state(&self.events, &inner.state);
            (inner.generation, token)
        };

        let (done_tx, done_rx) = watch::channel(false);
        let previous = last_acquisition.replace(done_rx);

        tokio::spawn(run_acquisition(
            self.device.clone(),
            self.options.clone(),
            self.inner.clone(),
            self.events.clone(),
            generation,
            token,
            previous,
            done_tx,
        ));

        log_debug!("Spawned camera acquisition {}", generation);
    }

    /// Abandon acquisition or preview and return to `Idle`. Never waits on the
    /// device; an acquisition still in flight releases its own handle.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state.phase {
            CapturePhase::Idle => return,
            CapturePhase::Acquiring => {
                if let Some(token) = inner.cancel.take() {
                    token.cancel();
                }
                inner.generation = inner.generation.wrapping_add(1);
                log_info!("Cancelled camera acquisition");
            }
            CapturePhase::Streaming => {
                if let Some(stream) = inner.stream.take() {
                    stream.release();
                }
                log_info!("Cancelled camera preview; device released");
            }
            CapturePhase::Error => {
                log_debug!("Dismissed capture error {:?}", inner.state.last_error);
            }
        }
        inner.state.reset();
        emit_state(&self.events, &inner.state);
    }

    /// Grab the current frame, emit it as [`CaptureEvent::Captured`] and tear
    /// the device down. Rejected without any state change unless streaming
    /// with a delivered frame.
    pub async fn capture(&self) -> Result<(), ScanError> {
        let mut inner = self.inner.lock().await;

        if inner.state.phase != CapturePhase::Streaming {
            log_warn!(
                "capture() rejected in phase {}",
                inner.state.phase.as_str()
            );
            return Err(ScanError::FrameNotReady);
        }

        let frame = inner
            .stream
            .as_ref()
            .and_then(|stream| stream.latest_frame())
            .filter(Frame::is_ready)
            .ok_or_else(|| {
                log_warn!("capture() rejected: no frame delivered yet");
                ScanError::FrameNotReady
            })?;

        let image = encode_frame(&frame, self.options.jpeg_quality)?;
        log_info!(
            "Captured {}x{} frame ({} bytes)",
            frame.width,
            frame.height,
            image.len()
        );
        let _ = self.events.send(CaptureEvent::Captured(image));

        if let Some(stream) = inner.stream.take() {
            stream.release();
        }
        inner.state.reset();
        emit_state(&self.events, &inner.state);
        Ok(())
    }

    /// Wait until every acquisition spawned so far has finished.
    pub async fn settle(&self) {
        let pending = self.last_acquisition.lock().await.clone();
        if let Some(mut done) = pending {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }
}

async fn run_acquisition<D: CaptureDevice>(
    device: Arc<D>,
    options: Arc<CaptureOptions>,
    inner: Arc<Mutex<SessionInner<D::Stream>>>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    generation: u64,
    token: CancellationToken,
    previous: Option<watch::Receiver<bool>>,
    done: watch::Sender<bool>,
) {
    if let Some(mut previous) = previous {
        let _ = previous.wait_for(|finished| *finished).await;
    }

    let superseded = inner.lock().await.generation != generation;
    if superseded {
        log_debug!("Acquisition {} superseded before requesting the device", generation);
        let _ = done.send(true);
        return;
    }

    let outcome = open_stream(&*device, &options, &token).await;

    {
        let mut guard = inner.lock().await;
        let current =
            guard.generation == generation && guard.state.phase == CapturePhase::Acquiring;
        if current {
            guard.cancel = None;
        }

        match (outcome, current) {
            (Ok(stream), true) => {
                guard.stream = Some(stream);
                guard.state.mark_streaming();
                emit_state(&events, &guard.state);
                log_info!("Camera streaming (acquisition {})", generation);
            }
            (Ok(stream), false) => {
                stream.release();
                log_info!(
                    "Acquisition {} finished after being superseded; device released",
                    generation
                );
            }
            (Err(err), true) => {
                let kind = err.classify();
                guard.state.fail(kind);
                emit_state(&events, &guard.state);
                log_warn!("Camera acquisition failed: {err} ({})", kind.as_str());
            }
            (Err(err), false) => {
                log_debug!("Ignoring failure of superseded acquisition {}: {err}", generation);
            }
        }
    }

    let _ = done.send(true);
}

/// Request the device and wait for its first frame. A provisional handle is
/// released on any failure after it was granted, and as soon as `token` is
/// cancelled.
async fn open_stream<D: CaptureDevice>(
    device: &D,
    options: &CaptureOptions,
    token: &CancellationToken,
) -> Result<D::Stream, DeviceError> {
    let timeout = options.acquire_timeout;

    let requested = tokio::select! {
        _ = token.cancelled() => {
            return Err(DeviceError::Other("acquisition cancelled".into()));
        }
        requested = time::timeout(timeout, device.acquire(&options.constraints)) => requested,
    };
    let mut stream = match requested {
        Ok(result) => result?,
        Err(_) => {
            return Err(DeviceError::Other(format!(
                "device request timed out after {}s",
                timeout.as_secs()
            )))
        }
    };

    let ready = tokio::select! {
        _ = token.cancelled() => None,
        ready = time::timeout(timeout, stream.wait_ready()) => Some(ready),
    };
    match ready {
        Some(Ok(Ok(()))) => Ok(stream),
        Some(Ok(Err(err))) => {
            stream.release();
            Err(err)
        }
        Some(Err(_)) => {
            stream.release();
            Err(DeviceError::Other(format!(
                "no frame within {}s",
                timeout.as_secs()
            )))
        }
        None => {
            stream.release();
            log_debug!("Released provisional camera handle of cancelled acquisition");
            Err(DeviceError::Other("acquisition cancelled".into()))
        }
    }
}

fn encode_frame(frame: &Frame, quality: u8) -> Result<ImageBuffer, ScanError> {
    let rgb = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(|| {
        log::error!(
            "Frame buffer of {} bytes does not match {}x{}",
            frame.rgb.len(),
            frame.width,
            frame.height
        );
        ScanError::FrameNotReady
    })?;

    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality)
        .encode_image(&rgb)
        .map_err(|err| {
            log::error!("JPEG encoding of captured frame failed: {err}");
            ScanError::FrameNotReady
        })?;

    Ok(ImageBuffer::new(
        data,
        "image/jpeg",
        Some((frame.width, frame.height)),
        ImageSource::Captured,
    ))
}

fn emit_state(events: &mpsc::UnboundedSender<CaptureEvent>, state: &CaptureState) {
    let _ = events.send(CaptureEvent::StateChanged(state.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_frame_at_native_resolution() {
        let frame = Frame {
            width: 4,
            height: 2,
            rgb: vec![200; 4 * 2 * 3],
        };
        let image = encode_frame(&frame, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(image.dimensions(), Some((4, 2)));
        assert_eq!(image.content_type(), "image/jpeg");
        assert_eq!(image.source(), ImageSource::Captured);

        let decoded = image::load_from_memory(image.data()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn short_frame_buffer_is_not_ready() {
        let frame = Frame {
            width: 4,
            height: 4,
            rgb: vec![0; 3],
        };
        assert_eq!(
            encode_frame(&frame, DEFAULT_JPEG_QUALITY),
            Err(ScanError::FrameNotReady)
        );
    }
}
