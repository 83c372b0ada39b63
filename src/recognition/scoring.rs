//! Comparison of a query signature against one reference.
//!
//! The job only depends on [`Scorer`]; swapping the algorithm never touches
//! the job's state machine.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, PoisonError},
};

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    errors::ScanError,
    models::{FeatureTag, ImageBuffer, ReferenceRecord},
};

use super::config::PerceptualConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// 0..=100
    pub confidence: f64,
    pub features: BTreeSet<FeatureTag>,
}

impl Score {
    pub fn new(confidence: f64, features: BTreeSet<FeatureTag>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            confidence,
            features,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("reference {id} is unavailable: {reason}")]
    ReferenceUnavailable { id: String, reason: String },
    #[error("scoring failed: {0}")]
    Internal(String),
}

impl ScoreError {
    pub fn classify(&self) -> ScanError {
        match self {
            ScoreError::ReferenceUnavailable { .. } => ScanError::ReferenceUnavailable,
            ScoreError::Internal(_) => ScanError::ScoringFailure,
        }
    }
}

pub trait Scorer: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn score(&self, image: &ImageBuffer, reference: &ReferenceRecord) -> Result<Score, ScoreError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ScorerKind {
    Random,
    Perceptual,
}

impl Default for ScorerKind {
    fn default() -> Self {
        ScorerKind::Perceptual
    }
}

impl ScorerKind {
    pub fn build(&self) -> Arc<dyn Scorer> {
        match self {
            ScorerKind::Random => Arc::new(RandomScorer::new()),
            ScorerKind::Perceptual => Arc::new(PerceptualScorer::new(PerceptualConfig::default())),
        }
    }
}

/// Placeholder scorer: arbitrary confidence in [20, 95) and the first one to
/// four of the classic feature tags. Only useful for demos.
pub struct RandomScorer {
    rng: Mutex<StdRng>,
}

impl RandomScorer {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for RandomScorer {
    fn name(&self) -> &'static str {
        "random"
    }

    fn score(&self, _image: &ImageBuffer, _reference: &ReferenceRecord) -> Result<Score, ScoreError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let confidence = (rng.gen::<f64>() * 95.0).max(20.0);
        let count = rng.gen_range(1..=4);
        let features = FeatureTag::ALL[..count].iter().copied().collect();
        Ok(Score::new(confidence, features))
    }
}

/// Compares perceptual hashes and coarse ink statistics of the two images.
pub struct PerceptualScorer {
    config: PerceptualConfig,
}

struct InkProfile {
    gradient: ImageHash,
    double_gradient: ImageHash,
    /// Share of pixels that are ink.
    density: f64,
    /// Standard deviation of ink luma; a stand-in for pen pressure.
    tone_spread: f64,
    /// Share of columns inside the ink bounding box that contain ink.
    column_coverage: f64,
    /// Width over height of the ink bounding box.
    aspect: f64,
}

impl PerceptualScorer {
    pub fn new(config: PerceptualConfig) -> Self {
        Self { config }
    }

    fn profile(&self, img: &DynamicImage) -> InkProfile {
        let gradient = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(8, 8)
            .to_hasher()
            .hash_image(img);
        let double_gradient = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(8, 8)
            .to_hasher()
            .hash_image(img);

        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        let cutoff = self.config.ink_luma_cutoff;

        let mut ink_pixels = 0u64;
        let mut tone_sum = 0f64;
        let mut tone_sq_sum = 0f64;
        let mut columns = vec![false; width as usize];
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (u32::MAX, 0u32, u32::MAX, 0u32);

        for (x, y, pixel) in luma.enumerate_pixels() {
            let value = pixel.0[0];
            if value >= cutoff {
                continue;
            }
            ink_pixels += 1;
            tone_sum += value as f64;
            tone_sq_sum += (value as f64) * (value as f64);
            columns[x as usize] = true;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let total = (width as u64 * height as u64).max(1) as f64;
        let (tone_spread, column_coverage, aspect) = if ink_pixels == 0 {
            (0.0, 0.0, width as f64 / height.max(1) as f64)
        } else {
            let mean = tone_sum / ink_pixels as f64;
            let variance = (tone_sq_sum / ink_pixels as f64 - mean * mean).max(0.0);
            let box_width = max_x - min_x + 1;
            let box_height = max_y - min_y + 1;
            let inked = columns[min_x as usize..=max_x as usize]
                .iter()
                .filter(|c| **c)
                .count();
            (
                variance.sqrt(),
                inked as f64 / box_width as f64,
                box_width as f64 / box_height as f64,
            )
        };

        InkProfile {
            gradient,
            double_gradient,
            density: ink_pixels as f64 / total,
            tone_spread,
            column_coverage,
            aspect,
        }
    }

    fn compare(&self, query: &InkProfile, reference: &InkProfile) -> Score {
        let c = &self.config;
        let similarities = [
            (
                FeatureTag::LetterFormation,
                c.weight_letter_formation,
                hash_similarity(&query.gradient, &reference.gradient),
            ),
            (
                FeatureTag::Curvature,
                c.weight_curvature,
                hash_similarity(&query.double_gradient, &reference.double_gradient),
            ),
            (
                FeatureTag::StrokeWidth,
                c.weight_stroke_width,
                ratio_similarity(query.density, reference.density),
            ),
            (
                FeatureTag::PressureVariation,
                c.weight_pressure,
                1.0 - ((query.tone_spread - reference.tone_spread).abs() / 128.0).min(1.0),
            ),
            (
                FeatureTag::SpacingPattern,
                c.weight_spacing,
                1.0 - (query.column_coverage - reference.column_coverage).abs().min(1.0),
            ),
            (
                FeatureTag::Length,
                c.weight_length,
                ratio_similarity(query.aspect, reference.aspect),
            ),
        ];

        let confidence: f64 = similarities
            .iter()
            .map(|(_, weight, similarity)| weight * similarity)
            .sum::<f64>()
            * 100.0;
        let features = similarities
            .iter()
            .filter(|(_, _, similarity)| *similarity >= c.feature_tag_threshold)
            .map(|(tag, _, _)| *tag)
            .collect();

        Score::new(confidence, features)
    }
}

impl Scorer for PerceptualScorer {
    fn name(&self) -> &'static str {
        "perceptual"
    }

    fn score(&self, image: &ImageBuffer, reference: &ReferenceRecord) -> Result<Score, ScoreError> {
        let query = image::load_from_memory(image.data())
            .map_err(|err| ScoreError::Internal(format!("query image not decodable: {err}")))?;
        let stored = image::load_from_memory(reference.reference_image.data()).map_err(|err| {
            ScoreError::ReferenceUnavailable {
                id: reference.id.clone(),
                reason: err.to_string(),
            }
        })?;

        Ok(self.compare(&self.profile(&query), &self.profile(&stored)))
    }
}

fn hash_similarity(lhs: &ImageHash, rhs: &ImageHash) -> f64 {
    let bits = (lhs.as_bytes().len() * 8).max(1) as f64;
    1.0 - (lhs.dist(rhs) as f64 / bits).min(1.0)
}

fn ratio_similarity(lhs: f64, rhs: f64) -> f64 {
    let (low, high) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
    if high <= f64::EPSILON {
        1.0
    } else {
        (low / high).clamp(0.0, 1.0)
    }
}
