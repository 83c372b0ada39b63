use serde::{Deserialize, Serialize};

use crate::{errors::ScanError, models::MatchResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum JobPhase {
    Idle,
    Running,
    Succeeded,
    NoMatch,
    Failed,
}

impl Default for JobPhase {
    fn default() -> Self {
        JobPhase::Idle
    }
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::NoMatch | JobPhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "Idle",
            JobPhase::Running => "Running",
            JobPhase::Succeeded => "Succeeded",
            JobPhase::NoMatch => "NoMatch",
            JobPhase::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub phase: JobPhase,
    /// 0..=100, never decreases while running.
    pub progress: f64,
    /// Sorted by descending confidence; only non-empty when `Succeeded`.
    pub results: Vec<MatchResult>,
    pub error: Option<ScanError>,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        *self = Self {
            phase: JobPhase::Running,
            ..Self::default()
        };
    }

    /// Record a progress checkpoint. Returns false (and changes nothing) if
    /// the value would move progress backwards or the job is not running.
    pub fn advance(&mut self, progress: f64) -> bool {
        let progress = progress.clamp(0.0, 100.0);
        if self.phase != JobPhase::Running || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub fn succeed(&mut self, results: Vec<MatchResult>) {
        self.phase = JobPhase::Succeeded;
        self.results = results;
        self.error = None;
    }

    pub fn no_match(&mut self) {
        self.phase = JobPhase::NoMatch;
        self.results.clear();
        self.error = None;
    }

    pub fn fail(&mut self, error: ScanError) {
        self.phase = JobPhase::Failed;
        self.results.clear();
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_regresses() {
        let mut state = JobState::new();
        assert!(!state.advance(10.0), "idle jobs do not accept progress");

        state.begin();
        assert!(state.advance(40.0));
        assert!(!state.advance(20.0));
        assert!(!state.advance(40.0));
        assert!(state.advance(150.0));
        assert_eq!(state.progress, 100.0);
    }

    #[test]
    fn begin_discards_previous_outcome() {
        let mut state = JobState::new();
        state.begin();
        state.advance(100.0);
        state.fail(ScanError::ScoringFailure);

        state.begin();
        assert_eq!(state.phase, JobPhase::Running);
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.error, None);
    }
}
