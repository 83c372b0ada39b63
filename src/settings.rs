use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::{
    capture::{CaptureOptions, DeviceConstraints, FacingMode},
    recognition::{RecognitionConfig, ScorerKind},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub jpeg_quality: u8,
    pub acquire_timeout_secs: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let options = CaptureOptions::default();
        Self {
            ideal_width: options.constraints.ideal_width,
            ideal_height: options.constraints.ideal_height,
            facing: options.constraints.facing,
            jpeg_quality: options.jpeg_quality,
            acquire_timeout_secs: options.acquire_timeout.as_secs(),
        }
    }
}

impl CaptureSettings {
    pub fn to_options(&self) -> CaptureOptions {
        CaptureOptions {
            constraints: DeviceConstraints {
                facing: self.facing,
                ideal_width: self.ideal_width,
                ideal_height: self.ideal_height,
                audio: false,
            },
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    pub confidence_threshold: f64,
    pub scorer: ScorerKind,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: RecognitionConfig::default().confidence_threshold,
            scorer: ScorerKind::default(),
        }
    }
}

impl RecognitionSettings {
    pub fn to_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            confidence_threshold: self.confidence_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub capture: CaptureSettings,
    pub recognition: RecognitionSettings,
}

impl AppSettings {
    /// Update one dotted key, e.g. `capture.jpeg_quality`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || format!("invalid value {value:?} for {key}");
        match key {
            "capture.ideal_width" => self.capture.ideal_width = value.parse().with_context(invalid)?,
            "capture.ideal_height" => {
                self.capture.ideal_height = value.parse().with_context(invalid)?
            }
            "capture.facing" => {
                self.capture.facing = match value {
                    "environment" => FacingMode::Environment,
                    "user" => FacingMode::User,
                    _ => bail!("{}; expected environment or user", invalid()),
                }
            }
            "capture.jpeg_quality" => {
                let quality: u8 = value.parse().with_context(invalid)?;
                if !(1..=100).contains(&quality) {
                    bail!("{}; expected 1-100", invalid());
                }
                self.capture.jpeg_quality = quality;
            }
            "capture.acquire_timeout_secs" => {
                let secs: u64 = value.parse().with_context(invalid)?;
                if secs == 0 {
                    bail!("{}; timeout must be positive", invalid());
                }
                self.capture.acquire_timeout_secs = secs;
            }
            "recognition.confidence_threshold" => {
                let threshold: f64 = value.parse().with_context(invalid)?;
                if !(0.0..=100.0).contains(&threshold) {
                    bail!("{}; expected 0-100", invalid());
                }
                self.recognition.confidence_threshold = threshold;
            }
            "recognition.scorer" => {
                self.recognition.scorer = match value {
                    "random" => ScorerKind::Random,
                    "perceptual" => ScorerKind::Perceptual,
                    _ => bail!("{}; expected random or perceptual", invalid()),
                }
            }
            other => bail!("unknown setting {other}"),
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unreadable settings at {}: {err}",
                    path.display()
                );
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> AppSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<F>(&self, apply: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings) -> Result<()>,
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next)?;
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
