use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Signature characteristics a scorer can credit for a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FeatureTag {
    StrokeWidth,
    SpacingPattern,
    Length,
    Curvature,
    PressureVariation,
    LetterFormation,
}

impl FeatureTag {
    pub const ALL: [FeatureTag; 6] = [
        FeatureTag::StrokeWidth,
        FeatureTag::SpacingPattern,
        FeatureTag::Length,
        FeatureTag::Curvature,
        FeatureTag::PressureVariation,
        FeatureTag::LetterFormation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeatureTag::StrokeWidth => "Stroke width similarity",
            FeatureTag::SpacingPattern => "Letter spacing pattern",
            FeatureTag::Length => "Signature length",
            FeatureTag::Curvature => "Curve characteristics",
            FeatureTag::PressureVariation => "Pressure variation",
            FeatureTag::LetterFormation => "Letter formation style",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrength {
    High,
    Possible,
    Low,
}

impl MatchStrength {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 80.0 {
            MatchStrength::High
        } else if confidence >= 60.0 {
            MatchStrength::Possible
        } else {
            MatchStrength::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchStrength::High => "High Match",
            MatchStrength::Possible => "Possible Match",
            MatchStrength::Low => "Low Match",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub reference_id: String,
    pub label: String,
    pub category: String,
    pub confidence: f64,
    pub matched_features: BTreeSet<FeatureTag>,
}

impl MatchResult {
    pub fn strength(&self) -> MatchStrength {
        MatchStrength::from_confidence(self.confidence)
    }
}
