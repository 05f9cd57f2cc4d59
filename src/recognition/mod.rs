pub mod features;
pub mod normalize;
pub mod similarity;
pub mod strategy;

// Re-export the main types for convenience
pub use features::{FeatureSet, FeatureTuning, PreprocessedDrawing, StrokeFeatureExtractor};
pub use normalize::NormalizeTuning;
pub use similarity::{
    complexity_similarity, feature_similarity, stroke_count_similarity, ScoringWeights,
    SimilarityScore, SimilarityScorer,
};
pub use strategy::{
    strategy_for, AttemptView, Calibration, GradeThresholds, LenientStrategy, Mode, ModeProfile,
    QualityIssue, ScoringStrategy, StrictStrategy,
};

use crate::character::CharacterTemplate;
use crate::grading::{classify, GradeLevel};
use serde::{Deserialize, Deserializer, Serialize};

/// All tuning for the similarity and calibration stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTuning {
    pub weights: ScoringWeights,
    #[serde(deserialize_with = "strict_profile")]
    pub strict: ModeProfile,
    #[serde(deserialize_with = "lenient_profile")]
    pub lenient: ModeProfile,
    pub lenient_passes: NormalizeTuning,
}

fn strict_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModeProfile, D::Error> {
    ModeProfile::strict().overlay(deserializer)
}

fn lenient_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModeProfile, D::Error> {
    ModeProfile::lenient().overlay(deserializer)
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            strict: ModeProfile::strict(),
            lenient: ModeProfile::lenient(),
            lenient_passes: NormalizeTuning::default(),
        }
    }
}

impl ScoringTuning {
    pub fn profile(&self, mode: Mode) -> &ModeProfile {
        match mode {
            Mode::Strict => &self.strict,
            Mode::Lenient => &self.lenient,
        }
    }

    /// `features` must be the tuning the attempt was preprocessed with
    pub fn strategy(&self, mode: Mode, features: &FeatureTuning) -> Box<dyn ScoringStrategy> {
        strategy_for(
            mode,
            &self.strict,
            &self.lenient,
            &self.lenient_passes,
            features,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionDetails {
    pub mode: Mode,
    pub expected_strokes: usize,
    pub actual_strokes: usize,
    pub point_count: usize,
    pub features: FeatureSet,
    pub score: SimilarityScore,
    /// Tier the raw confidence maps to on the child-friendly scale (lenient only)
    pub encouragement_level: Option<GradeLevel>,
}

/// Verdict of comparing one attempt with its target template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    /// Target the drawing was matched against; `None` when scored against the generic baseline
    pub character: Option<String>,
    pub confidence: f64,
    pub recognized: bool,
    pub details: Option<RecognitionDetails>,
}

impl RecognitionResult {
    /// Result for an attempt that produced nothing to analyze
    pub fn empty() -> Self {
        Self {
            character: None,
            confidence: 0.0,
            recognized: false,
            details: None,
        }
    }
}

/// Scores a preprocessed drawing against `template` and packages the verdict.
///
/// `known_target` is false when `template` is the generic baseline.
pub fn recognize(
    drawing: &PreprocessedDrawing<'_>,
    template: &CharacterTemplate,
    known_target: bool,
    scorer: &SimilarityScorer,
    strategy: &dyn ScoringStrategy,
) -> RecognitionResult {
    let score = scorer.score(drawing, template, strategy);
    let profile = strategy.profile();
    let confidence = score.confidence;
    let encouragement_level = match strategy.mode() {
        Mode::Lenient => Some(classify(confidence, &profile.thresholds)),
        Mode::Strict => None,
    };

    RecognitionResult {
        character: known_target.then(|| template.character.clone()),
        confidence,
        recognized: drawing.stroke_count > 0 && confidence >= profile.recognition_floor,
        details: Some(RecognitionDetails {
            mode: strategy.mode(),
            expected_strokes: template.stroke_count,
            actual_strokes: drawing.stroke_count,
            point_count: drawing.point_count,
            features: score.features,
            score,
            encouragement_level,
        }),
    }
}
