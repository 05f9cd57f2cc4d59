use crate::drawing::DrawingData;
use crate::recognition::{GradeThresholds, Mode, QualityIssue, RecognitionResult, ScoringTuning};
use serde::{Deserialize, Serialize};

/// Three-tier grade shown to the learner
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GradeLevel {
    Excellent,
    Fair,
    Poor,
}

/// Why an attempt short-circuited instead of being graded normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeReason {
    NoDrawing,
    RecognitionFailed,
    MalformedInput,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDetails {
    pub reason: Option<GradeReason>,
    pub mode: Option<Mode>,
    pub expected_strokes: Option<usize>,
    pub actual_strokes: usize,
    pub similarity: f64,
    /// Confidence reached `excellent` but the stroke count was too far off
    pub capped_by_stroke_count: bool,
    pub quality_issues: Vec<QualityIssue>,
}

impl ScoreDetails {
    pub fn stroke_mismatch(&self) -> Option<(usize, usize)> {
        match self.expected_strokes {
            Some(expected) if expected != self.actual_strokes && self.actual_strokes > 0 => {
                Some((expected, self.actual_strokes))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub level: GradeLevel,
    pub score: f64,
    pub confidence: f64,
    pub details: ScoreDetails,
}

impl ScoreResult {
    fn short_circuit(reason: GradeReason, actual_strokes: usize) -> Self {
        Self {
            level: GradeLevel::Poor,
            score: 0.0,
            confidence: 0.0,
            details: ScoreDetails {
                reason: Some(reason),
                actual_strokes,
                ..Default::default()
            },
        }
    }
}

/// Message bundle shown after an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub message: String,
    pub encouragement: String,
    pub icon: String,
    pub show_example: bool,
}

/// Maps a confidence onto a tier; thresholds are inclusive lower bounds.
pub fn classify(confidence: f64, thresholds: &GradeThresholds) -> GradeLevel {
    if confidence >= thresholds.excellent {
        GradeLevel::Excellent
    } else if confidence >= thresholds.fair {
        GradeLevel::Fair
    } else {
        GradeLevel::Poor
    }
}

#[derive(Debug, Clone)]
pub struct GradingEngine {
    strict: GradeThresholds,
    lenient: GradeThresholds,
    strict_fallback: f64,
    lenient_fallback: f64,
}

impl Default for GradingEngine {
    fn default() -> Self {
        Self::new(&ScoringTuning::default())
    }
}

impl GradingEngine {
    pub fn new(tuning: &ScoringTuning) -> Self {
        Self {
            strict: tuning.strict.thresholds,
            lenient: tuning.lenient.thresholds,
            strict_fallback: tuning.strict.fallback_confidence,
            lenient_fallback: tuning.lenient.fallback_confidence,
        }
    }

    pub fn thresholds(&self, mode: Mode) -> &GradeThresholds {
        match mode {
            Mode::Strict => &self.strict,
            Mode::Lenient => &self.lenient,
        }
    }

    /// Grades one recognized attempt.
    pub fn grade(
        &self,
        recognition: &RecognitionResult,
        target: &str,
        drawing: &DrawingData,
    ) -> ScoreResult {
        if drawing.is_empty() {
            return ScoreResult::short_circuit(GradeReason::NoDrawing, 0);
        }
        let details = match (&recognition.details, recognition.recognized) {
            (Some(details), true) => details,
            _ => {
                return ScoreResult::short_circuit(
                    GradeReason::RecognitionFailed,
                    drawing.stroke_count(),
                )
            }
        };

        if details.score.fallback {
            return self.fallback(details.mode, drawing.stroke_count());
        }

        let thresholds = self.thresholds(details.mode);
        let confidence = recognition.confidence.clamp(0.0, 1.0);
        let mut level = classify(confidence, thresholds);
        let deviation = details.actual_strokes.abs_diff(details.expected_strokes);
        let capped = level == GradeLevel::Excellent && deviation > thresholds.stroke_tolerance;
        if capped {
            level = GradeLevel::Fair;
        }

        tracing::debug!(%target, %level, confidence, deviation, capped, "graded attempt");

        ScoreResult {
            level,
            score: confidence,
            confidence,
            details: ScoreDetails {
                reason: None,
                mode: Some(details.mode),
                expected_strokes: Some(details.expected_strokes),
                actual_strokes: details.actual_strokes,
                similarity: details.score.similarity,
                capped_by_stroke_count: capped,
                quality_issues: details.score.calibration.issues.clone(),
            },
        }
    }

    /// Fixed grade for input that could not be scored: lenient attempts still
    /// get an encouraging `fair`, strict ones a zero-confidence `poor`.
    pub fn fallback(&self, mode: Mode, actual_strokes: usize) -> ScoreResult {
        let (level, confidence) = match mode {
            Mode::Lenient => (GradeLevel::Fair, self.lenient_fallback),
            Mode::Strict => (GradeLevel::Poor, self.strict_fallback),
        };
        ScoreResult {
            level,
            score: confidence,
            confidence,
            details: ScoreDetails {
                reason: Some(GradeReason::MalformedInput),
                mode: Some(mode),
                actual_strokes,
                ..Default::default()
            },
        }
    }
}

/// Feedback for a tier; only less-successful attempts are offered the example.
pub fn feedback(level: GradeLevel, target: &str) -> Feedback {
    let (message, encouragement, icon) = match level {
        GradeLevel::Excellent => (
            format!("Wonderful! That is a beautiful {target}."),
            "You are a writing star!",
            "🌟",
        ),
        GradeLevel::Fair => (
            format!("Good try! Your {target} is taking shape."),
            "Let's look at the example together.",
            "👍",
        ),
        GradeLevel::Poor => (
            format!("Let's practice {target} one more time."),
            "Every try makes your hand stronger!",
            "💪",
        ),
    };
    Feedback {
        message,
        encouragement: encouragement.to_string(),
        icon: icon.to_string(),
        show_example: level != GradeLevel::Excellent,
    }
}

/// Picks the most actionable hint for the learner
pub fn suggestion(result: &ScoreResult, target: &str) -> String {
    if result.details.reason == Some(GradeReason::NoDrawing) {
        return "Try drawing something on the canvas first.".to_string();
    }
    if let Some((expected, actual)) = result.details.stroke_mismatch() {
        let plural = |n: usize| if n == 1 { "stroke" } else { "strokes" };
        return format!(
            "{target} is written with {expected} {}. You drew {actual} {}.",
            plural(expected),
            plural(actual)
        );
    }
    match result.level {
        GradeLevel::Excellent => {
            format!("Great job! Next time, check you write {target} in the right stroke order.")
        }
        GradeLevel::Fair => format!("Watch the example and trace {target} slowly."),
        GradeLevel::Poor => format!("Follow the example one stroke at a time to write {target}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{DeviceType, Point, Stroke};
    use crate::recognition::{
        Calibration, FeatureSet, RecognitionDetails, SimilarityScore,
    };
    use assert_matches::assert_matches;

    fn drawing(strokes: usize) -> DrawingData {
        DrawingData::from_strokes(
            (0..strokes)
                .map(|s| {
                    Stroke::new(vec![
                        Point::new(0.0, s as f64 * 10.0, 0),
                        Point::new(50.0, s as f64 * 10.0, 10),
                    ])
                })
                .collect(),
            DeviceType::Touch,
        )
    }

    fn recognition(mode: Mode, confidence: f64, expected: usize, actual: usize) -> RecognitionResult {
        RecognitionResult {
            character: Some("あ".to_string()),
            confidence,
            recognized: true,
            details: Some(RecognitionDetails {
                mode,
                expected_strokes: expected,
                actual_strokes: actual,
                point_count: actual * 2,
                features: FeatureSet::default(),
                score: SimilarityScore {
                    features: FeatureSet::default(),
                    stroke_count_similarity: 1.0,
                    feature_similarity: 1.0,
                    complexity_similarity: 1.0,
                    similarity: confidence,
                    confidence,
                    calibration: Calibration::default(),
                    fallback: false,
                },
                encouragement_level: None,
            }),
        }
    }

    #[test]
    fn empty_drawing_short_circuits() {
        let engine = GradingEngine::default();
        let result = engine.grade(&RecognitionResult::empty(), "あ", &DrawingData::default());
        assert_eq!(result.level, GradeLevel::Poor);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_matches!(result.details.reason, Some(GradeReason::NoDrawing));
    }

    #[test]
    fn unrecognized_attempt_short_circuits() {
        let engine = GradingEngine::default();
        let mut rec = recognition(Mode::Strict, 0.9, 3, 3);
        rec.recognized = false;
        let result = engine.grade(&rec, "あ", &drawing(3));
        assert_eq!(result.level, GradeLevel::Poor);
        assert_eq!(result.confidence, 0.0);
        assert_matches!(result.details.reason, Some(GradeReason::RecognitionFailed));
    }

    #[test]
    fn thresholds_are_inclusive_lower_bounds() {
        let strict = ScoringTuning::default().strict.thresholds;
        assert_eq!(classify(0.75, &strict), GradeLevel::Excellent);
        assert_eq!(classify(0.7499, &strict), GradeLevel::Fair);
        assert_eq!(classify(0.4, &strict), GradeLevel::Fair);
        assert_eq!(classify(0.39, &strict), GradeLevel::Poor);

        let lenient = ScoringTuning::default().lenient.thresholds;
        assert_eq!(classify(0.5, &lenient), GradeLevel::Excellent);
        assert_eq!(classify(0.2, &lenient), GradeLevel::Fair);
        assert_eq!(classify(0.19, &lenient), GradeLevel::Poor);
    }

    #[test]
    fn miscounted_strokes_cap_excellent_at_fair() {
        let engine = GradingEngine::default();
        let result = engine.grade(&recognition(Mode::Strict, 0.95, 3, 1), "あ", &drawing(1));
        assert_eq!(result.level, GradeLevel::Fair);
        assert!(result.details.capped_by_stroke_count);

        let within = engine.grade(&recognition(Mode::Strict, 0.95, 3, 2), "あ", &drawing(2));
        assert_eq!(within.level, GradeLevel::Excellent);
    }

    #[test]
    fn lenient_thresholds_apply_to_lenient_details() {
        let engine = GradingEngine::default();
        let result = engine.grade(&recognition(Mode::Lenient, 0.55, 2, 2), "い", &drawing(2));
        assert_eq!(result.level, GradeLevel::Excellent);
        let strict = engine.grade(&recognition(Mode::Strict, 0.55, 2, 2), "い", &drawing(2));
        assert_eq!(strict.level, GradeLevel::Fair);
    }

    #[test]
    fn scorer_fallback_maps_to_fixed_grade() {
        let engine = GradingEngine::default();
        let mut rec = recognition(Mode::Lenient, 0.3, 2, 2);
        if let Some(details) = rec.details.as_mut() {
            details.score.fallback = true;
        }
        let result = engine.grade(&rec, "い", &drawing(2));
        assert_eq!(result.level, GradeLevel::Fair);
        assert_matches!(result.details.reason, Some(GradeReason::MalformedInput));

        let strict = engine.fallback(Mode::Strict, 2);
        assert_eq!(strict.level, GradeLevel::Poor);
        assert_eq!(strict.confidence, 0.0);
    }

    #[test]
    fn feedback_offers_example_only_below_excellent() {
        assert!(!feedback(GradeLevel::Excellent, "あ").show_example);
        assert!(feedback(GradeLevel::Fair, "あ").show_example);
        assert!(feedback(GradeLevel::Poor, "あ").show_example);
        assert!(feedback(GradeLevel::Poor, "ぬ").message.contains('ぬ'));
        assert_eq!(feedback(GradeLevel::Excellent, "あ"), feedback(GradeLevel::Excellent, "あ"));
    }

    #[test]
    fn suggestions_prefer_specific_causes() {
        let engine = GradingEngine::default();

        let empty = engine.grade(&RecognitionResult::empty(), "あ", &DrawingData::default());
        assert!(suggestion(&empty, "あ").contains("drawing something"));

        let miscount = engine.grade(&recognition(Mode::Strict, 0.95, 3, 1), "あ", &drawing(1));
        assert_eq!(
            suggestion(&miscount, "あ"),
            "あ is written with 3 strokes. You drew 1 stroke."
        );

        let good = engine.grade(&recognition(Mode::Strict, 0.95, 3, 3), "あ", &drawing(3));
        assert_eq!(
            suggestion(&good, "あ"),
            "Great job! Next time, check you write あ in the right stroke order."
        );
    }
}
