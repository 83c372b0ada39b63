//! Classified failures reported by the capture and recognition state machines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure the core reports to its caller. The `Display` text is the
/// message shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
pub enum ScanError {
    #[error("Camera access denied. Please allow camera permissions and try again.")]
    DeviceAccessDenied,
    #[error("No camera found on this device.")]
    DeviceNotFound,
    #[error("The camera is in use by another application. Close it and try again.")]
    DeviceBusy,
    #[error("Unable to access the camera. Please try again.")]
    DeviceUnavailable,
    #[error("Camera not ready. Please wait for the camera to start.")]
    FrameNotReady,
    #[error("Please select a valid image file.")]
    InvalidUpload,
    #[error("No reference signatures to compare against. Add a reference first.")]
    EmptyReferenceSet,
    #[error("Reference signatures became unavailable during analysis. Please try again.")]
    ReferenceUnavailable,
    #[error("Error during signature analysis. Please try again.")]
    ScoringFailure,
    #[error("An analysis is already in progress.")]
    JobInProgress,
}

impl ScanError {
    /// Whether retrying the same operation can succeed without changing hardware.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ScanError::DeviceNotFound)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanError::DeviceAccessDenied => "DeviceAccessDenied",
            ScanError::DeviceNotFound => "DeviceNotFound",
            ScanError::DeviceBusy => "DeviceBusy",
            ScanError::DeviceUnavailable => "DeviceUnavailable",
            ScanError::FrameNotReady => "FrameNotReady",
            ScanError::InvalidUpload => "InvalidUpload",
            ScanError::EmptyReferenceSet => "EmptyReferenceSet",
            ScanError::ReferenceUnavailable => "ReferenceUnavailable",
            ScanError::ScoringFailure => "ScoringFailure",
            ScanError::JobInProgress => "JobInProgress",
        }
    }
}

/// Raw failure reported by a capture backend before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("camera permission refused: {0}")]
    AccessDenied(String),
    #[error("no capture device: {0}")]
    NotFound(String),
    #[error("capture device busy: {0}")]
    Busy(String),
    #[error("capture device failed: {0}")]
    Other(String),
}

// EBUSY on Linux and macOS.
const EBUSY: i32 = 16;

impl DeviceError {
    pub fn classify(&self) -> ScanError {
        match self {
            DeviceError::AccessDenied(_) => ScanError::DeviceAccessDenied,
            DeviceError::NotFound(_) => ScanError::DeviceNotFound,
            DeviceError::Busy(_) => ScanError::DeviceBusy,
            DeviceError::Other(_) => ScanError::DeviceUnavailable,
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        let detail = err.to_string();
        if err.raw_os_error() == Some(EBUSY) {
            return DeviceError::Busy(detail);
        }
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => DeviceError::AccessDenied(detail),
            std::io::ErrorKind::NotFound => DeviceError::NotFound(detail),
            _ => DeviceError::Other(detail),
        }
    }
}
