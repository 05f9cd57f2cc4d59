use super::features::{
    self, FeatureSet, FeatureTuning, PreprocessedDrawing, StrokeFeatureExtractor,
};
use super::normalize::{self, NormalizeTuning};
use crate::drawing::{BoundingBox, Canvas, Stroke};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which scoring path an attempt is evaluated with
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Strict,
    /// Child-friendly path that rewards effort over precision
    #[default]
    Lenient,
}

/// Confidence cut-offs for the three grade tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub excellent: f64,
    pub fair: f64,
    /// Max stroke-count deviation still allowed for `excellent`
    pub stroke_tolerance: usize,
}

/// Per-mode calibration constants.
///
/// The lenient profile must stay at least as forgiving as the strict one on
/// every knob: wider bands, milder factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    /// Multiplier on stroke-count deviation in the stroke similarity
    pub stroke_penalty: f64,
    pub min_points: usize,
    pub max_points: usize,
    pub few_points_factor: f64,
    pub many_points_factor: f64,
    pub min_area: f64,
    pub max_area: f64,
    pub area_factor: f64,
    pub max_aspect_ratio: f64,
    pub aspect_factor: f64,
    /// Allowed offset of the drawing center from the canvas center, as a fraction of canvas size
    pub position_tolerance: f64,
    pub position_factor: f64,
    /// Confidence below which the attempt is reported as not recognized
    pub recognition_floor: f64,
    /// Confidence every non-empty attempt is lifted to
    pub confidence_floor: f64,
    /// Scale of the effort bonus (path length and point density)
    pub effort_weight: f64,
    /// Point count at which the density half of the effort bonus saturates
    pub effort_ideal_points: usize,
    /// Confidence reported when the input could not be scored at all
    pub fallback_confidence: f64,
    pub thresholds: GradeThresholds,
}

impl ModeProfile {
    pub fn strict() -> Self {
        Self {
            stroke_penalty: 1.0,
            min_points: 5,
            max_points: 1500,
            few_points_factor: 0.5,
            many_points_factor: 0.7,
            min_area: 900.0,
            max_area: 360_000.0,
            area_factor: 0.7,
            max_aspect_ratio: 8.0,
            aspect_factor: 0.8,
            position_tolerance: 0.25,
            position_factor: 0.85,
            recognition_floor: 0.05,
            confidence_floor: 0.0,
            effort_weight: 0.0,
            effort_ideal_points: 40,
            fallback_confidence: 0.0,
            thresholds: GradeThresholds {
                excellent: 0.75,
                fair: 0.4,
                stroke_tolerance: 1,
            },
        }
    }

    pub fn lenient() -> Self {
        Self {
            stroke_penalty: 0.5,
            min_points: 3,
            max_points: 3000,
            few_points_factor: 0.8,
            many_points_factor: 0.9,
            min_area: 400.0,
            max_area: 640_000.0,
            area_factor: 0.85,
            max_aspect_ratio: 12.0,
            aspect_factor: 0.9,
            position_tolerance: 0.35,
            position_factor: 0.95,
            recognition_floor: 0.0,
            confidence_floor: 0.1,
            effort_weight: 0.15,
            effort_ideal_points: 40,
            fallback_confidence: 0.3,
            thresholds: GradeThresholds {
                excellent: 0.5,
                fair: 0.2,
                stroke_tolerance: 2,
            },
        }
    }

    /// Reads a profile that may name only some fields, taking the rest
    /// (nested thresholds included) from `self`.
    pub fn overlay<'de, D: Deserializer<'de>>(self, deserializer: D) -> Result<Self, D::Error> {
        let mut merged = serde_json::to_value(&self).map_err(de::Error::custom)?;
        merge_json(&mut merged, Value::deserialize(deserializer)?);
        serde_json::from_value(merged).map_err(de::Error::custom)
    }

    /// Product of the input-quality penalties that apply
    pub fn quality_factor(
        &self,
        point_count: usize,
        bbox: &BoundingBox,
        canvas: Option<&Canvas>,
    ) -> (f64, Vec<QualityIssue>) {
        let mut factor = 1.0;
        let mut issues = Vec::new();

        if point_count < self.min_points {
            factor *= self.few_points_factor;
            issues.push(QualityIssue::TooFewPoints);
        } else if point_count > self.max_points {
            factor *= self.many_points_factor;
            issues.push(QualityIssue::TooManyPoints);
        }

        let area = bbox.area();
        if area < self.min_area {
            factor *= self.area_factor;
            issues.push(QualityIssue::TooSmall);
        } else if area > self.max_area {
            factor *= self.area_factor;
            issues.push(QualityIssue::TooLarge);
        }

        if bbox
            .aspect_ratio()
            .is_some_and(|ratio| ratio > self.max_aspect_ratio)
        {
            factor *= self.aspect_factor;
            issues.push(QualityIssue::ExtremeAspectRatio);
        }

        if let Some(canvas) = canvas {
            let off_x = (bbox.center_x - canvas.width / 2.0).abs() / canvas.width;
            let off_y = (bbox.center_y - canvas.height / 2.0).abs() / canvas.height;
            if off_x.max(off_y) > self.position_tolerance {
                factor *= self.position_factor;
                issues.push(QualityIssue::OffCenter);
            }
        }

        (factor, issues)
    }
}

fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Input-quality problem that lowered the confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    TooFewPoints,
    TooManyPoints,
    TooSmall,
    TooLarge,
    ExtremeAspectRatio,
    OffCenter,
}

/// How a raw similarity became a confidence
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Calibration {
    pub confidence: f64,
    pub quality_factor: f64,
    pub issues: Vec<QualityIssue>,
    pub effort_bonus: f64,
}

/// The features a strategy compares against templates
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptView {
    /// Reading reported for the attempt
    pub features: FeatureSet,
    /// Reading of the captured input when it differs from `features`; the
    /// comparison keeps whichever agrees better with the template
    pub captured_features: Option<FeatureSet>,
}

/// Strategy for turning geometric similarity into calibrated confidence.
///
/// Resolved once per evaluation; helpers never branch on the mode.
pub trait ScoringStrategy {
    fn mode(&self) -> Mode;

    fn profile(&self) -> &ModeProfile;

    fn view(&self, drawing: &PreprocessedDrawing<'_>) -> AttemptView;

    fn calibrate(&self, drawing: &PreprocessedDrawing<'_>, similarity: f64) -> Calibration;
}

/// Precision-oriented scoring: raw input, full penalties
pub struct StrictStrategy {
    profile: ModeProfile,
}

impl StrictStrategy {
    pub fn new(profile: ModeProfile) -> Self {
        Self { profile }
    }
}

impl ScoringStrategy for StrictStrategy {
    fn mode(&self) -> Mode {
        Mode::Strict
    }

    fn profile(&self) -> &ModeProfile {
        &self.profile
    }

    fn view(&self, drawing: &PreprocessedDrawing<'_>) -> AttemptView {
        AttemptView {
            features: drawing.features,
            captured_features: None,
        }
    }

    fn calibrate(&self, drawing: &PreprocessedDrawing<'_>, similarity: f64) -> Calibration {
        if drawing.stroke_count == 0 {
            return Calibration::default();
        }
        let (quality_factor, issues) = self.profile.quality_factor(
            drawing.point_count,
            &drawing.bounding_box,
            drawing.source.canvas.as_ref(),
        );
        Calibration {
            confidence: (similarity * quality_factor).clamp(0.0, 1.0),
            quality_factor,
            issues,
            effort_bonus: 0.0,
        }
    }
}

/// Child-friendly scoring: reads features from the cleaned strokes, softens
/// penalties and adds an effort bonus on top of a guaranteed floor.
pub struct LenientStrategy {
    profile: ModeProfile,
    passes: NormalizeTuning,
    extractor: StrokeFeatureExtractor,
}

impl LenientStrategy {
    pub fn new(profile: ModeProfile, passes: NormalizeTuning) -> Self {
        Self {
            profile,
            passes,
            extractor: StrokeFeatureExtractor::default(),
        }
    }

    /// Uses `extractor` for the cleaned strokes; it should match the one
    /// that preprocessed the attempt.
    pub fn with_extractor(mut self, extractor: StrokeFeatureExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    fn effort_bonus(&self, path_length: f64, diagonal: f64, point_count: usize) -> f64 {
        let path = if diagonal > 0.0 {
            (path_length / (2.0 * diagonal)).min(1.0)
        } else {
            0.0
        };
        let density = if self.profile.effort_ideal_points > 0 {
            (point_count as f64 / self.profile.effort_ideal_points as f64).min(1.0)
        } else {
            0.0
        };
        self.profile.effort_weight * (0.5 * path + 0.5 * density)
    }
}

impl ScoringStrategy for LenientStrategy {
    fn mode(&self) -> Mode {
        Mode::Lenient
    }

    fn profile(&self) -> &ModeProfile {
        &self.profile
    }

    fn view(&self, drawing: &PreprocessedDrawing<'_>) -> AttemptView {
        let cleaned = normalize::clean(
            drawing.source.strokes(),
            &drawing.bounding_box,
            &self.passes,
        );
        let (strokes, _) = features::to_unit_square(&cleaned.strokes, &cleaned.bounding_box);
        let features = self.extractor.extract(&strokes);
        AttemptView {
            features,
            captured_features: (features != drawing.features).then_some(drawing.features),
        }
    }

    fn calibrate(&self, drawing: &PreprocessedDrawing<'_>, similarity: f64) -> Calibration {
        if drawing.stroke_count == 0 {
            return Calibration::default();
        }
        // Penalties are judged on the captured input, with tiny drawings
        // enlarged as the clean-up would. Smoothing can pull a spiky outline
        // inwards, so the cleaned bounds must not decide the penalties.
        let judged = normalize::enlarged(&drawing.bounding_box, self.passes.min_drawing_size)
            .unwrap_or(drawing.bounding_box);
        let (quality_factor, issues) = self.profile.quality_factor(
            drawing.point_count,
            &judged,
            drawing.source.canvas.as_ref(),
        );
        // Effort is what the child actually put down: smoothing would shorten
        // the path and gap filling would pad the density.
        let effort_bonus = self.effort_bonus(
            drawing.source.strokes().iter().map(Stroke::path_length).sum(),
            drawing.bounding_box.diagonal(),
            drawing.point_count,
        );
        let confidence = (similarity * quality_factor + effort_bonus)
            .max(self.profile.confidence_floor)
            .clamp(0.0, 1.0);
        Calibration {
            confidence,
            quality_factor,
            issues,
            effort_bonus,
        }
    }
}

/// Builds the strategy for `mode` from the configured profiles
pub fn strategy_for(
    mode: Mode,
    strict: &ModeProfile,
    lenient: &ModeProfile,
    passes: &NormalizeTuning,
    features: &FeatureTuning,
) -> Box<dyn ScoringStrategy> {
    match mode {
        Mode::Strict => Box::new(StrictStrategy::new(strict.clone())),
        Mode::Lenient => Box::new(
            LenientStrategy::new(lenient.clone(), passes.clone())
                .with_extractor(StrokeFeatureExtractor::new(features.clone())),
        ),
    }
}
