//! Camera backends as seen by the capture session.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::errors::DeviceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Rear camera, pointed at the document.
    Environment,
    User,
}

impl Default for FacingMode {
    fn default() -> Self {
        FacingMode::Environment
    }
}

/// What the session asks a backend for. Resolution is a preference; the
/// backend reports the dimensions it actually delivers through its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl Default for DeviceConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            audio: false,
        }
    }
}

/// One decoded video frame in packed RGB8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl Frame {
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A camera-like source that can be opened.
pub trait CaptureDevice: Send + Sync + 'static {
    type Stream: DeviceStream;

    /// Request a live video source. May suspend for a permission prompt.
    fn acquire(
        &self,
        constraints: &DeviceConstraints,
    ) -> impl Future<Output = Result<Self::Stream, DeviceError>> + Send;
}

/// A live handle to an opened camera. Dropping a stream without calling
/// [`DeviceStream::release`] leaves the camera open.
pub trait DeviceStream: Send + 'static {
    /// Resolves once the first frame is decodable.
    fn wait_ready(&mut self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Most recent frame, if the device has delivered one.
    fn latest_frame(&self) -> Option<Frame>;

    /// Stop all tracks and give the camera back.
    fn release(self);
}
