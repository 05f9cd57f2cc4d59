use super::features::{FeatureSet, PreprocessedDrawing};
use super::strategy::{Calibration, ScoringStrategy};
use crate::character::CharacterTemplate;
use serde::{Deserialize, Serialize};

/// Relative weights of the three sub-scores in the composite similarity.
///
/// Stroke count carries the most weight: it is the most reliable signal in
/// children's handwriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub stroke_count: f64,
    pub features: f64,
    pub complexity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            stroke_count: 0.5,
            features: 0.3,
            complexity: 0.2,
        }
    }
}

/// Sub-scores and the calibrated result of comparing one drawing to one template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScore {
    /// Features of the attempt as the strategy read them
    pub features: FeatureSet,
    pub stroke_count_similarity: f64,
    pub feature_similarity: f64,
    pub complexity_similarity: f64,
    pub similarity: f64,
    pub confidence: f64,
    pub calibration: Calibration,
    /// Set when the input could not be scored and the per-mode fallback was used
    pub fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    weights: ScoringWeights,
}

impl SimilarityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        drawing: &PreprocessedDrawing<'_>,
        template: &CharacterTemplate,
        strategy: &dyn ScoringStrategy,
    ) -> SimilarityScore {
        let profile = strategy.profile();
        let view = strategy.view(drawing);
        let stroke = stroke_count_similarity(
            drawing.stroke_count,
            template.stroke_count,
            profile.stroke_penalty,
        );
        let shape = |features: &FeatureSet| {
            let feature = feature_similarity(Some(features), Some(&template.features));
            let complexity = complexity_similarity(features.complexity, template.features.complexity);
            let combined = self.weights.features * feature + self.weights.complexity * complexity;
            (feature, complexity, combined)
        };
        let mut best = shape(&view.features);
        if let Some(captured) = view.captured_features.as_ref().map(shape) {
            if captured.2 > best.2 {
                best = captured;
            }
        }
        let (feature, complexity, _) = best;

        let total_weight = self.weights.stroke_count + self.weights.features + self.weights.complexity;
        let similarity = if total_weight > 0.0 {
            ((self.weights.stroke_count * stroke
                + self.weights.features * feature
                + self.weights.complexity * complexity)
                / total_weight)
                .clamp(0.0, 1.0)
        } else {
            f64::NAN
        };

        if !similarity.is_finite() {
            return fallback_score(strategy, view.features);
        }
        let calibration = strategy.calibrate(drawing, similarity);
        if !calibration.confidence.is_finite() {
            return fallback_score(strategy, view.features);
        }

        tracing::debug!(
            mode = %strategy.mode(),
            template = %template.character,
            stroke,
            feature,
            complexity,
            similarity,
            confidence = calibration.confidence,
            "scored drawing"
        );

        SimilarityScore {
            features: view.features,
            stroke_count_similarity: stroke,
            feature_similarity: feature,
            complexity_similarity: complexity,
            similarity,
            confidence: calibration.confidence,
            calibration,
            fallback: false,
        }
    }
}

fn fallback_score(strategy: &dyn ScoringStrategy, features: FeatureSet) -> SimilarityScore {
    let confidence = strategy.profile().fallback_confidence;
    tracing::warn!(mode = %strategy.mode(), "drawing could not be scored, using fallback");
    SimilarityScore {
        features,
        stroke_count_similarity: 0.0,
        feature_similarity: 0.0,
        complexity_similarity: 0.0,
        similarity: 0.0,
        confidence,
        calibration: Calibration {
            confidence,
            ..Calibration::default()
        },
        fallback: true,
    }
}

/// 1.0 for an exact match, decaying with the stroke-count difference.
///
/// A template expecting zero strokes is only matched by an empty drawing.
pub fn stroke_count_similarity(actual: usize, expected: usize, penalty: f64) -> f64 {
    if expected == 0 {
        return if actual == 0 { 1.0 } else { 0.0 };
    }
    let diff = actual.abs_diff(expected) as f64;
    1.0 / (1.0 + penalty.max(0.0) * diff)
}

/// Fraction of the three boolean features that agree
pub fn feature_similarity(actual: Option<&FeatureSet>, expected: Option<&FeatureSet>) -> f64 {
    let (Some(a), Some(e)) = (actual, expected) else {
        return 0.0;
    };
    let agreeing = [
        a.has_horizontal_line == e.has_horizontal_line,
        a.has_vertical_line == e.has_vertical_line,
        a.has_curve == e.has_curve,
    ]
    .iter()
    .filter(|&&same| same)
    .count();
    agreeing as f64 / 3.0
}

/// Unknown (non-finite) complexity on either side scores a neutral 0.5.
pub fn complexity_similarity(actual: f64, expected: f64) -> f64 {
    if !actual.is_finite() || !expected.is_finite() {
        return 0.5;
    }
    1.0 - (actual - expected).abs().min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{DeviceType, DrawingData, Point, Stroke};
    use crate::recognition::features::StrokeFeatureExtractor;
    use crate::recognition::normalize::NormalizeTuning;
    use crate::recognition::strategy::{LenientStrategy, ModeProfile, StrictStrategy};

    fn template(stroke_count: usize, h: bool, v: bool, c: bool, complexity: f64) -> CharacterTemplate {
        CharacterTemplate {
            character: "t".to_string(),
            stroke_count,
            features: FeatureSet {
                has_horizontal_line: h,
                has_vertical_line: v,
                has_curve: c,
                complexity,
            },
        }
    }

    #[test]
    fn stroke_similarity_is_exact_at_match_and_non_increasing() {
        assert_eq!(stroke_count_similarity(3, 3, 1.0), 1.0);
        let mut previous = 1.0;
        for diff in 1..10 {
            let s = stroke_count_similarity(3 + diff, 3, 1.0);
            assert!(s <= previous);
            assert!(s > 0.0);
            previous = s;
        }
        assert_eq!(stroke_count_similarity(1, 3, 1.0), stroke_count_similarity(5, 3, 1.0));
    }

    #[test]
    fn zero_stroke_template_never_matches_non_empty_drawing() {
        assert_eq!(stroke_count_similarity(1, 0, 0.5), 0.0);
        assert_eq!(stroke_count_similarity(0, 0, 0.5), 1.0);
    }

    #[test]
    fn lenient_penalty_is_gentler() {
        assert!(stroke_count_similarity(1, 3, 0.5) > stroke_count_similarity(1, 3, 1.0));
    }

    #[test]
    fn feature_similarity_is_reflexive_and_counts_agreement() {
        let f = template(1, true, false, true, 0.4).features;
        assert_eq!(feature_similarity(Some(&f), Some(&f)), 1.0);

        let g = FeatureSet {
            has_curve: false,
            ..f
        };
        assert!((feature_similarity(Some(&f), Some(&g)) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(feature_similarity(None, Some(&f)), 0.0);
        assert_eq!(feature_similarity(Some(&f), None), 0.0);
    }

    #[test]
    fn complexity_similarity_handles_unknowns() {
        assert_eq!(complexity_similarity(0.7, 0.7), 1.0);
        assert!((complexity_similarity(0.2, 0.7) - 0.5).abs() < 1e-12);
        assert_eq!(complexity_similarity(f64::NAN, 0.7), 0.5);
        assert_eq!(complexity_similarity(0.3, f64::INFINITY), 0.5);
        assert_eq!(complexity_similarity(-3.0, 2.0), 0.0);
    }

    #[test]
    fn perfect_match_scores_near_one_in_strict_mode() {
        let strokes: Vec<Stroke> = (0..2)
            .map(|s| {
                Stroke::new(
                    (0..10)
                        .map(|i| Point::new(i as f64 * 10.0, s as f64 * 80.0, i))
                        .collect(),
                )
            })
            .collect();
        let drawing = DrawingData::from_strokes(strokes, DeviceType::Pen);
        let pre = StrokeFeatureExtractor::default().preprocess(&drawing).unwrap();
        let t = template(2, true, false, false, pre.complexity());

        let score = SimilarityScorer::default().score(
            &pre,
            &t,
            &StrictStrategy::new(ModeProfile::strict()),
        );
        assert!(!score.fallback);
        assert!((score.similarity - 1.0).abs() < 1e-12);
        assert!(score.confidence > 0.99);
    }

    #[test]
    fn zero_weights_fall_back_per_mode() {
        let drawing = DrawingData::from_strokes(
            vec![Stroke::new(vec![Point::new(0.0, 0.0, 0), Point::new(50.0, 50.0, 10)])],
            DeviceType::Touch,
        );
        let pre = StrokeFeatureExtractor::default().preprocess(&drawing).unwrap();
        let scorer = SimilarityScorer::new(ScoringWeights {
            stroke_count: 0.0,
            features: 0.0,
            complexity: 0.0,
        });
        let t = template(1, false, false, false, 0.1);

        let strict = scorer.score(&pre, &t, &StrictStrategy::new(ModeProfile::strict()));
        assert!(strict.fallback);
        assert_eq!(strict.confidence, 0.0);

        let lenient = scorer.score(
            &pre,
            &t,
            &LenientStrategy::new(ModeProfile::lenient(), NormalizeTuning::default()),
        );
        assert!(lenient.fallback);
        assert_eq!(lenient.confidence, 0.3);
    }
}
