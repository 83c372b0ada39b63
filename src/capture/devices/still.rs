//! A camera that always shows the same picture, read from disk. Used by the
//! command line in place of real hardware.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    capture::device::{CaptureDevice, DeviceConstraints, DeviceStream, Frame},
    errors::DeviceError,
};

pub struct StillImageDevice {
    path: PathBuf,
    open_streams: Arc<AtomicUsize>,
}

impl StillImageDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Streams handed out and not yet released.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for StillImageDevice {
    type Stream = StillImageStream;

    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<StillImageStream, DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::NotFound(self.path.display().to_string()));
        }

        let path = self.path.clone();
        let bytes = tokio::fs::read(&path).await?;
        log::debug!(
            "Opened still-image camera {} (ideal {}x{}, facing {:?})",
            path.display(),
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.facing
        );

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(StillImageStream {
            path,
            bytes,
            frame: None,
            open_streams: self.open_streams.clone(),
        })
    }
}

pub struct StillImageStream {
    path: PathBuf,
    bytes: Vec<u8>,
    frame: Option<Frame>,
    open_streams: Arc<AtomicUsize>,
}

impl DeviceStream for StillImageStream {
    async fn wait_ready(&mut self) -> Result<(), DeviceError> {
        let bytes = std::mem::take(&mut self.bytes);
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|err| DeviceError::Other(format!("decoder task failed: {err}")))?
            .map_err(|err| {
                DeviceError::Other(format!("{} is not decodable: {err}", self.path.display()))
            })?;

        let rgb = decoded.to_rgb8();
        self.frame = Some(Frame {
            width: rgb.width(),
            height: rgb.height(),
            rgb: rgb.into_raw(),
        });
        Ok(())
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.frame.clone()
    }

    fn release(self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
        log::debug!("Released still-image camera {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let device = StillImageDevice::new("/no/such/camera.png");
        let err = device
            .acquire(&DeviceConstraints::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::NotFound(_)));
    }

    #[tokio::test]
    async fn delivers_file_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(32, 18, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let device = StillImageDevice::new(&path);
        let mut stream = device.acquire(&DeviceConstraints::default()).await.unwrap();
        assert!(stream.latest_frame().is_none());

        stream.wait_ready().await.unwrap();
        let frame = stream.latest_frame().unwrap();
        assert_eq!((frame.width, frame.height), (32, 18));
        assert_eq!(device.open_streams(), 1);

        stream.release();
        assert_eq!(device.open_streams(), 0);
    }
}
