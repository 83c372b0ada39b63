//! Command-line surface.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::{
    app::{capture_still, resolve_data_dir, AppState, Orchestrator},
    capture::{devices::StillImageDevice, load_upload, CaptureSession},
    db::{Database, ReferenceRepository},
    models::{ImageBuffer, NewReference, ReferenceRecord},
    recognition::{JobPhase, JobState, RecognitionJob, ScorerKind},
};

#[derive(Parser, Debug)]
#[command(name = "sigscan", version)]
#[command(about = "Capture signatures and match them against stored references")]
pub struct Cli {
    /// Directory holding the reference database and settings.json
    #[arg(long, global = true, env = "SIGSCAN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage reference signatures
    Refs {
        #[command(subcommand)]
        action: RefsAction,
    },

    /// Compare a signature image against every reference
    Analyze {
        #[arg(long)]
        image: PathBuf,
        #[command(flatten)]
        recognition: RecognitionArgs,
    },

    /// Capture one frame from a file-backed camera
    Capture {
        /// Image the simulated camera streams
        #[arg(long)]
        device_image: PathBuf,
        /// Write the captured JPEG here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run recognition on the captured frame
        #[arg(long)]
        analyze: bool,
        #[command(flatten)]
        recognition: RecognitionArgs,
    },

    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum RefsAction {
    List,
    Add {
        #[arg(long)]
        label: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image: PathBuf,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    /// Set a dotted key such as `recognition.confidence_threshold`
    Set { key: String, value: String },
}

#[derive(clap::Args, Debug, Default)]
pub struct RecognitionArgs {
    /// Override the configured scorer
    #[arg(long, value_enum)]
    pub scorer: Option<ScorerKind>,
    /// Override the configured confidence threshold (0-100)
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    let state = AppState::open(&data_dir)?;
    let json = cli.json;

    match cli.command {
        Command::Refs { action } => match action {
            RefsAction::List => cmd_refs_list(&state.db, json).await,
            RefsAction::Add {
                label,
                category,
                image,
            } => cmd_refs_add(&state, label, category, &image, json).await,
            RefsAction::Remove { id } => cmd_refs_remove(&state.db, &id, json).await,
        },
        Command::Analyze { image, recognition } => {
            let image = load_upload(&image)
                .with_context(|| format!("cannot use {} as a signature", image.display()))?;
            cmd_analyze(&state, image, &recognition, json).await
        }
        Command::Capture {
            device_image,
            output,
            analyze,
            recognition,
        } => {
            cmd_capture(
                &state,
                &device_image,
                output.as_deref(),
                analyze.then_some(&recognition),
                json,
            )
            .await
        }
        Command::Settings { action } => cmd_settings(&state, action, json),
    }
}

fn build_orchestrator(
    state: &AppState,
    args: Option<&RecognitionArgs>,
) -> Result<Orchestrator<Database>> {
    let settings = state.settings.get().recognition;
    let mut config = settings.to_config();
    let mut scorer = settings.scorer;

    if let Some(args) = args {
        if let Some(threshold) = args.threshold {
            if !(0.0..=100.0).contains(&threshold) {
                bail!("threshold must be between 0 and 100");
            }
            config.confidence_threshold = threshold;
        }
        if let Some(kind) = args.scorer {
            scorer = kind;
        }
    }

    let (job, events) = RecognitionJob::new(scorer.build(), config);
    Ok(Orchestrator::new(state.db.clone(), job, events))
}

async fn cmd_refs_list(db: &Database, json: bool) -> Result<()> {
    let references = db.list().await?;
    if json {
        return print_json(&references);
    }
    if references.is_empty() {
        println!("No reference signatures stored.");
        return Ok(());
    }
    for reference in &references {
        print_reference(reference);
    }
    Ok(())
}

async fn cmd_refs_add(
    state: &AppState,
    label: String,
    category: String,
    image: &Path,
    json: bool,
) -> Result<()> {
    let reference_image = load_upload(image)
        .with_context(|| format!("cannot use {} as a reference", image.display()))?;
    let orchestrator = build_orchestrator(state, None)?;
    let record = orchestrator
        .add_reference(NewReference {
            label,
            category,
            reference_image: Some(reference_image),
        })
        .await?;

    if json {
        return print_json(&record);
    }
    println!("Added reference:");
    print_reference(&record);
    Ok(())
}

async fn cmd_refs_remove(db: &Database, id: &str, json: bool) -> Result<()> {
    let removed = db.remove(id).await?;
    if json {
        return print_json(&serde_json::json!({ "id": id, "removed": removed }));
    }
    if !removed {
        bail!("no reference with id {id}");
    }
    println!("Removed reference {id}");
    Ok(())
}

async fn cmd_analyze(
    state: &AppState,
    image: ImageBuffer,
    args: &RecognitionArgs,
    json: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(state, Some(args))?;
    let threshold = orchestrator.job().config().confidence_threshold;

    let outcome = orchestrator
        .analyze(image, |progress| {
            if !json {
                eprint!("\rAnalyzing signature... {progress:>5.1}%");
                let _ = io::stderr().flush();
            }
        })
        .await?;
    if !json {
        eprintln!();
    }

    if json {
        print_json(&outcome)?;
        return failure_of(&outcome);
    }
    print_outcome(&outcome, threshold)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureReport {
    width: Option<u32>,
    height: Option<u32>,
    bytes: usize,
    content_type: String,
    output: Option<PathBuf>,
    analysis: Option<JobState>,
}

async fn cmd_capture(
    state: &AppState,
    device_image: &Path,
    output: Option<&Path>,
    analyze: Option<&RecognitionArgs>,
    json: bool,
) -> Result<()> {
    let options = state.settings.get().capture.to_options();
    let (session, mut events) = CaptureSession::new(StillImageDevice::new(device_image), options);
    let image = capture_still(&session, &mut events).await?;

    if let Some(path) = output {
        std::fs::write(path, image.data())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let mut report = CaptureReport {
        width: image.width(),
        height: image.height(),
        bytes: image.len(),
        content_type: image.content_type().to_string(),
        output: output.map(Path::to_path_buf),
        analysis: None,
    };

    let threshold = match analyze {
        Some(args) => {
            let orchestrator = build_orchestrator(state, Some(args))?;
            let threshold = orchestrator.job().config().confidence_threshold;
            report.analysis = Some(orchestrator.analyze(image, |_| {}).await?);
            threshold
        }
        None => 0.0,
    };

    if json {
        print_json(&report)?;
        return match &report.analysis {
            Some(outcome) => failure_of(outcome),
            None => Ok(()),
        };
    }

    println!(
        "Captured {}x{} {} ({} bytes)",
        report.width.unwrap_or_default(),
        report.height.unwrap_or_default(),
        report.content_type,
        report.bytes
    );
    if let Some(path) = &report.output {
        println!("Saved to {}", path.display());
    }
    match &report.analysis {
        Some(outcome) => print_outcome(outcome, threshold),
        None => Ok(()),
    }
}

fn cmd_settings(state: &AppState, action: SettingsAction, json: bool) -> Result<()> {
    let settings = match action {
        SettingsAction::Show => state.settings.get(),
        SettingsAction::Set { key, value } => state.settings.update(|s| s.set(&key, &value))?,
    };

    if json {
        return print_json(&settings);
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    println!("# {}", state.settings.path().display());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_reference(reference: &ReferenceRecord) {
    println!(
        "{}  {}  [{}]  added {}",
        reference.id,
        reference.label,
        reference.category,
        reference.created_at.format("%Y-%m-%d %H:%M")
    );
}

/// A failed analysis is the command's error in both output modes.
fn failure_of(outcome: &JobState) -> Result<()> {
    match (outcome.phase, outcome.error) {
        (JobPhase::Failed, Some(error)) => Err(error.into()),
        (JobPhase::Failed, None) => bail!("analysis failed"),
        (JobPhase::Idle | JobPhase::Running, _) => {
            bail!("analysis did not finish ({})", outcome.phase.as_str())
        }
        _ => Ok(()),
    }
}

fn print_outcome(outcome: &JobState, threshold: f64) -> Result<()> {
    match outcome.phase {
        JobPhase::Succeeded => {
            println!("Matches:");
            for result in &outcome.results {
                let features: Vec<&str> =
                    result.matched_features.iter().map(|tag| tag.label()).collect();
                println!(
                    "  {:>5.1}%  {:<15} {} ({})",
                    result.confidence,
                    result.strength().label(),
                    result.label,
                    result.category
                );
                if !features.is_empty() {
                    println!("          {}", features.join(", "));
                }
            }
        }
        JobPhase::NoMatch => {
            println!("No match found: no reference reached {threshold:.0}% confidence.");
        }
        JobPhase::Failed | JobPhase::Idle | JobPhase::Running => {}
    }
    failure_of(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ScanError, recognition::JobState};

    #[test]
    fn failed_outcome_is_an_error() {
        let mut outcome = JobState::new();
        outcome.begin();
        outcome.fail(ScanError::EmptyReferenceSet);

        let err = failure_of(&outcome).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ScanError>(),
            Some(&ScanError::EmptyReferenceSet)
        );
    }

    #[test]
    fn finished_outcomes_are_not_errors() {
        let mut outcome = JobState::new();
        outcome.begin();
        outcome.no_match();
        assert!(failure_of(&outcome).is_ok());

        outcome.begin();
        outcome.succeed(Vec::new());
        assert!(failure_of(&outcome).is_ok());

        assert!(failure_of(&JobState::new()).is_err());
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["sigscan", "analyze", "--image", "sig.png", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Analyze { .. }));
    }
}
