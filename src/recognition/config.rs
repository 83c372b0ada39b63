/// Best match must reach this confidence for any result to be surfaced.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub confidence_threshold: f64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Tunable weights for the perceptual scorer. Weights sum to 1.0.
#[derive(Debug, Clone)]
pub struct PerceptualConfig {
    pub weight_letter_formation: f64,
    pub weight_curvature: f64,
    pub weight_stroke_width: f64,
    pub weight_pressure: f64,
    pub weight_spacing: f64,
    pub weight_length: f64,

    /// A feature is reported as matched at or above this similarity (0..1).
    pub feature_tag_threshold: f64,

    /// Luma below this counts as ink.
    pub ink_luma_cutoff: u8,
}

impl Default for PerceptualConfig {
    fn default() -> Self {
        Self {
            weight_letter_formation: 0.30,
            weight_curvature: 0.20,
            weight_stroke_width: 0.15,
            weight_pressure: 0.10,
            weight_spacing: 0.15,
            weight_length: 0.10,
            feature_tag_threshold: 0.70,
            ink_luma_cutoff: 128,
        }
    }
}
