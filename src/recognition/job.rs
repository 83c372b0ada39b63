use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::ScanError,
    models::{ImageBuffer, MatchResult, ReferenceRecord},
};

use super::{
    config::RecognitionConfig,
    ranking::{rank_results, RankedOutcome},
    scoring::Scorer,
    state::{JobPhase, JobState},
};

// Set to false to silence transition logging for recognition jobs
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A scoring checkpoint was reached.
    Progress(f64),
    StateChanged(JobState),
}

struct JobInner {
    state: JobState,
    /// Bumped by every run and every cancellation; results from an older
    /// generation are dropped.
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct Worker {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Runs one scored comparison of an image against a reference snapshot.
#[derive(Clone)]
pub struct RecognitionJob {
    inner: Arc<Mutex<JobInner>>,
    scorer: Arc<dyn Scorer>,
    config: RecognitionConfig,
    events: mpsc::UnboundedSender<JobEvent>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl RecognitionJob {
    pub fn new(
        scorer: Arc<dyn Scorer>,
        config: RecognitionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let job = Self {
            inner: Arc::new(Mutex::new(JobInner {
                state: JobState::new(),
                generation: 0,
                cancel: None,
            })),
            scorer,
            config,
            events,
            worker: Arc::new(Mutex::new(None)),
        };
        (job, receiver)
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub async fn state(&self) -> JobState {
        self.inner.lock().await.state.clone()
    }

    /// Start scoring `image` against `references`. Any previous outcome is
    /// discarded. An empty reference set fails the job immediately.
    pub async fn analyze(
        &self,
        image: ImageBuffer,
        references: Vec<ReferenceRecord>,
    ) -> Result<(), ScanError> {
        let mut worker = self.worker.lock().await;

        let (generation, token) = {
            let mut inner = self.inner.lock().await;
            if inner.state.phase == JobPhase::Running {
                log_warn!("analyze() rejected: job {} still running", inner.generation);
                return Err(ScanError::JobInProgress);
            }

            inner.generation = inner.generation.wrapping_add(1);
            inner.state.begin();

            if references.is_empty() {
                *worker = None;
                inner.state.fail(ScanError::EmptyReferenceSet);
                emit_state(&self.events, &inner.state);
                log_warn!("No reference signatures to compare against");
                return Ok(());
            }

            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            emit_state(&self.events, &inner.state);
            (inner.generation, token)
        };

        log_info!(
            "Analyzing signature against {} references with {} scorer",
            references.len(),
            self.scorer.name()
        );

        let pass = ScoringPass {
            scorer: self.scorer.clone(),
            image: Arc::new(image),
            references: Arc::new(references),
            token,
            reporter: ProgressReporter {
                inner: self.inner.clone(),
                events: self.events.clone(),
                generation,
            },
        };
        let threshold = self.config.confidence_threshold;

        let handle = tokio::spawn(async move {
            let outcome = match pass.run().await {
                Ok(scored) => Ok(rank_results(scored, threshold)),
                Err(PassError::Cancelled) => return,
                Err(PassError::Failed(kind)) => Err(kind),
            };
            pass.reporter.finish(outcome).await;
        });

        *worker = Some(Worker { generation, handle });
        Ok(())
    }

    /// Return a finished job to `Idle`. Rejected while running.
    pub async fn reset(&self) -> Result<(), ScanError> {
        let mut inner = self.inner.lock().await;
        match inner.state.phase {
            JobPhase::Running => {
                log_warn!("reset() rejected: job {} still running", inner.generation);
                Err(ScanError::JobInProgress)
            }
            JobPhase::Idle => Ok(()),
            _ => {
                inner.state.reset();
                emit_state(&self.events, &inner.state);
                Ok(())
            }
        }
    }

    /// Abandon a running job between scoring checkpoints and return to
    /// `Idle`. Returns false if nothing was running.
    pub async fn cancel(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.phase != JobPhase::Running {
            return false;
        }
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.generation = inner.generation.wrapping_add(1);
        inner.state.reset();
        emit_state(&self.events, &inner.state);
        log_info!("Cancelled running analysis");
        true
    }

    /// Wait for the current run, if any, and return the resulting state.
    pub async fn wait(&self) -> JobState {
        let worker = self.worker.lock().await.take();

        if let Some(Worker { generation, handle }) = worker {
            if let Err(err) = handle.await {
                log_error!("Recognition task {} aborted: {err}", generation);
                let mut inner = self.inner.lock().await;
                if inner.generation == generation && inner.state.phase == JobPhase::Running {
                    inner.state.fail(ScanError::ScoringFailure);
                    emit_state(&self.events, &inner.state);
                }
            }
        }

        self.state().await
    }
}

enum PassError {
    Cancelled,
    Failed(ScanError),
}

/// Scores every reference in order, reporting progress after each one.
struct ScoringPass {
    scorer: Arc<dyn Scorer>,
    image: Arc<ImageBuffer>,
    references: Arc<Vec<ReferenceRecord>>,
    token: CancellationToken,
    reporter: ProgressReporter,
}

impl ScoringPass {
    async fn run(&self) -> Result<Vec<MatchResult>, PassError> {
        let total = self.references.len();
        let mut scored = Vec::with_capacity(total);

        for index in 0..total {
            if self.token.is_cancelled() {
                log_debug!("Scoring pass cancelled after {index} of {total}");
                return Err(PassError::Cancelled);
            }

            let scorer = self.scorer.clone();
            let image = self.image.clone();
            let references = self.references.clone();
            let score = tokio::task::spawn_blocking(move || scorer.score(&image, &references[index]))
                .await
                .map_err(|err| {
                    log_error!("Scoring worker failed: {err}");
                    PassError::Failed(ScanError::ScoringFailure)
                })?
                .map_err(|err| {
                    log_warn!("Scoring failed: {err}");
                    PassError::Failed(err.classify())
                })?;

            let reference = &self.references[index];
            scored.push(MatchResult {
                reference_id: reference.id.clone(),
                label: reference.label.clone(),
                category: reference.category.clone(),
                confidence: score.confidence,
                matched_features: score.features,
            });

            let completed = index + 1;
            let progress = if completed == total {
                100.0
            } else {
                completed as f64 * 100.0 / total as f64
            };
            if !self.reporter.report(progress).await {
                return Err(PassError::Cancelled);
            }
        }

        Ok(scored)
    }
}

struct ProgressReporter {
    inner: Arc<Mutex<JobInner>>,
    events: mpsc::UnboundedSender<JobEvent>,
    generation: u64,
}

impl ProgressReporter {
    /// Returns false once this run has been superseded or cancelled.
    async fn report(&self, progress: f64) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != self.generation || inner.state.phase != JobPhase::Running {
            return false;
        }
        if inner.state.advance(progress) {
            let _ = self.events.send(JobEvent::Progress(inner.state.progress));
        }
        true
    }

    async fn finish(&self, outcome: Result<RankedOutcome, ScanError>) {
        let mut inner = self.inner.lock().await;
        if inner.generation != self.generation || inner.state.phase != JobPhase::Running {
            log_debug!("Discarding outcome of superseded job {}", self.generation);
            return;
        }

        match outcome {
            Ok(RankedOutcome::Matched(results)) => {
                log_info!(
                    "Analysis complete: best match {:.1}% across {} references",
                    results.first().map(|r| r.confidence).unwrap_or_default(),
                    results.len()
                );
                inner.state.succeed(results);
            }
            Ok(RankedOutcome::NoMatch) => {
                log_info!("Analysis complete: no reference cleared the threshold");
                inner.state.no_match();
            }
            Err(kind) => {
                log_warn!("Analysis failed: {}", kind.as_str());
                inner.state.fail(kind);
            }
        }
        inner.cancel = None;
        emit_state(&self.events, &inner.state);
    }
}

fn emit_state(events: &mpsc::UnboundedSender<JobEvent>, state: &JobState) {
    let _ = events.send(JobEvent::StateChanged(state.clone()));
}
