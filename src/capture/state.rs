use serde::{Deserialize, Serialize};

use crate::errors::ScanError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Idle,
    Acquiring,
    Streaming,
    Error,
}

impl Default for CapturePhase {
    fn default() -> Self {
        CapturePhase::Idle
    }
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePhase::Idle => "Idle",
            CapturePhase::Acquiring => "Acquiring",
            CapturePhase::Streaming => "Streaming",
            CapturePhase::Error => "Error",
        }
    }
}

/// Observable state of a capture session. `last_error` is only set in
/// `CapturePhase::Error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub phase: CapturePhase,
    pub last_error: Option<ScanError>,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == CapturePhase::Acquiring
    }

    pub fn begin_acquiring(&mut self) {
        *self = Self {
            phase: CapturePhase::Acquiring,
            last_error: None,
        };
    }

    pub fn mark_streaming(&mut self) {
        *self = Self {
            phase: CapturePhase::Streaming,
            last_error: None,
        };
    }

    pub fn fail(&mut self, error: ScanError) {
        *self = Self {
            phase: CapturePhase::Error,
            last_error: Some(error),
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_only_present_in_error_phase() {
        let mut state = CaptureState::new();
        state.begin_acquiring();
        assert!(state.is_loading());

        state.fail(ScanError::DeviceBusy);
        assert_eq!(state.phase, CapturePhase::Error);
        assert_eq!(state.last_error, Some(ScanError::DeviceBusy));

        state.begin_acquiring();
        assert_eq!(state.last_error, None);

        state.mark_streaming();
        state.reset();
        assert_eq!(state, CaptureState::default());
    }
}
