pub mod config;
pub mod job;
pub mod ranking;
pub mod scoring;
pub mod state;

pub use config::{PerceptualConfig, RecognitionConfig, DEFAULT_CONFIDENCE_THRESHOLD};
pub use job::{JobEvent, RecognitionJob};
pub use ranking::{rank_results, RankedOutcome};
pub use scoring::{PerceptualScorer, RandomScorer, Score, ScoreError, Scorer, ScorerKind};
pub use state::{JobPhase, JobState};
