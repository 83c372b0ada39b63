//! Wires the reference store, capture session and recognition job together.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::{mpsc, Mutex};

use crate::{
    capture::{CaptureDevice, CaptureEvent, CapturePhase, CaptureSession},
    db::{Database, ReferenceRepository},
    errors::ScanError,
    models::{ImageBuffer, NewReference, ReferenceRecord},
    recognition::{JobEvent, JobPhase, JobState, RecognitionJob},
    settings::SettingsStore,
};

pub const DATA_DIR_ENV: &str = "SIGSCAN_DATA_DIR";
const DB_FILE_NAME: &str = "sigscan.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Resolve the data directory: explicit path, then `SIGSCAN_DATA_DIR`, then
/// the platform data directory.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("sigscan"))
        .context("could not determine a data directory; pass --data-dir")
}

/// Long-lived handles shared by every command.
pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
}

impl AppState {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DB_FILE_NAME))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME))?;
        Ok(Self { db, settings })
    }
}

pub struct Orchestrator<R: ReferenceRepository> {
    repository: R,
    job: RecognitionJob,
    job_events: Mutex<mpsc::UnboundedReceiver<JobEvent>>,
}

impl<R: ReferenceRepository> Orchestrator<R> {
    pub fn new(
        repository: R,
        job: RecognitionJob,
        job_events: mpsc::UnboundedReceiver<JobEvent>,
    ) -> Self {
        Self {
            repository,
            job,
            job_events: Mutex::new(job_events),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn job(&self) -> &RecognitionJob {
        &self.job
    }

    pub async fn add_reference(&self, new: NewReference) -> Result<ReferenceRecord> {
        let record = new.into_record()?;
        self.repository.append(record.clone()).await?;
        info!("Added reference {} ({})", record.id, record.label);
        Ok(record)
    }

    /// Score `image` against a snapshot of the current references and return
    /// the terminal job state. `on_progress` sees every checkpoint in order.
    pub async fn analyze<F>(
        &self,
        image: ImageBuffer,
        mut on_progress: F,
    ) -> Result<JobState, ScanError>
    where
        F: FnMut(f64),
    {
        let references = self.repository.list().await.map_err(|err| {
            warn!("Failed to load reference signatures: {err:#}");
            ScanError::ReferenceUnavailable
        })?;

        let mut events = self.job_events.lock().await;

        if self.job.state().await.phase.is_terminal() {
            self.job.reset().await?;
        }
        while events.try_recv().is_ok() {}

        self.job.analyze(image, references).await?;

        while let Some(event) = events.recv().await {
            match event {
                JobEvent::Progress(progress) => on_progress(progress),
                JobEvent::StateChanged(state)
                    if state.phase.is_terminal() || state.phase == JobPhase::Idle =>
                {
                    break;
                }
                JobEvent::StateChanged(_) => {}
            }
        }

        Ok(self.job.wait().await)
    }
}

/// Run one acquire, capture and release cycle on `session` and return the
/// captured image.
pub async fn capture_still<D: CaptureDevice>(
    session: &CaptureSession<D>,
    events: &mut mpsc::UnboundedReceiver<CaptureEvent>,
) -> Result<ImageBuffer, ScanError> {
    session.start().await;
    session.settle().await;

    let state = session.state().await;
    if state.phase != CapturePhase::Streaming {
        return Err(state.last_error.unwrap_or(ScanError::DeviceUnavailable));
    }

    session.capture().await?;

    while let Some(event) = events.recv().await {
        if let CaptureEvent::Captured(image) = event {
            return Ok(image);
        }
    }
    Err(ScanError::FrameNotReady)
}
