use crate::drawing::{BoundingBox, DrawingData, Point, Stroke};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Coarse geometric description of a glyph
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    pub has_horizontal_line: bool,
    pub has_vertical_line: bool,
    pub has_curve: bool,
    #[serde(default)]
    pub complexity: f64,
}

/// Thresholds and weights used by feature extraction.
///
/// Distances are in unit-square coordinates (the drawing's bounding box
/// mapped onto `[0,1]x[0,1]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureTuning {
    /// Minimum extent along one axis (and maximum drift along the other) for a line
    pub line_extent_threshold: f64,
    /// Direction samples are taken only after the pen moved at least this far
    pub min_segment_length: f64,
    /// Net turning, in radians, above which a stroke counts as curved
    pub curve_turn_threshold: f64,
    /// Max distance from the start-end chord, relative to chord length
    pub chord_deviation_threshold: f64,
    /// Longer strokes are decimated to this many points before run scanning
    pub max_analysis_points: usize,
    pub curve_weight: f64,
    pub intersection_weight: f64,
    pub angle_weight: f64,
    pub both_lines_intersection: f64,
    pub one_line_intersection: f64,
}

impl Default for FeatureTuning {
    fn default() -> Self {
        Self {
            line_extent_threshold: 0.3,
            min_segment_length: 0.05,
            curve_turn_threshold: 0.6,
            chord_deviation_threshold: 0.12,
            max_analysis_points: 256,
            curve_weight: 0.4,
            intersection_weight: 0.3,
            angle_weight: 0.3,
            both_lines_intersection: 0.8,
            one_line_intersection: 0.4,
        }
    }
}

/// Output of the single preprocessing pass over one attempt.
///
/// Both scoring strategies consume the same value, so extraction runs once.
#[derive(Debug, Clone)]
pub struct PreprocessedDrawing<'a> {
    pub source: &'a DrawingData,
    pub stroke_count: usize,
    pub point_count: usize,
    /// Strokes mapped into the unit square (raw copies when the box is degenerate)
    pub strokes: Vec<Stroke>,
    pub normalized: bool,
    pub bounding_box: BoundingBox,
    pub features: FeatureSet,
}

impl PreprocessedDrawing<'_> {
    pub fn complexity(&self) -> f64 {
        self.features.complexity
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrokeFeatureExtractor {
    tuning: FeatureTuning,
}

impl StrokeFeatureExtractor {
    pub fn new(tuning: FeatureTuning) -> Self {
        Self { tuning }
    }

    /// Normalizes the drawing and derives its features; `None` when there is
    /// nothing to analyze.
    pub fn preprocess<'a>(&self, drawing: &'a DrawingData) -> Option<PreprocessedDrawing<'a>> {
        let bounding_box = *drawing.bounding_box()?;
        if drawing.is_empty() {
            return None;
        }

        let (strokes, normalized) = to_unit_square(drawing.strokes(), &bounding_box);
        let features = self.extract(&strokes);

        Some(PreprocessedDrawing {
            source: drawing,
            stroke_count: drawing.stroke_count(),
            point_count: drawing.point_count(),
            strokes,
            normalized,
            bounding_box,
            features,
        })
    }

    /// Derives the feature set of already-normalized strokes
    pub fn extract(&self, strokes: &[Stroke]) -> FeatureSet {
        let t = &self.tuning;
        let mut has_horizontal_line = false;
        let mut has_vertical_line = false;
        let mut has_curve = false;
        let mut turn_total = 0.0;
        let mut turn_samples = 0usize;

        for stroke in strokes {
            let points = decimate(&stroke.points, t.max_analysis_points);

            if !(has_horizontal_line && has_vertical_line) {
                let (h, v) = detect_lines(&points, t.line_extent_threshold);
                has_horizontal_line |= h;
                has_vertical_line |= v;
            }

            let turns = turn_angles(&points, t.min_segment_length);
            turn_total += turns.iter().map(|a| a.abs() / PI).sum::<f64>();
            turn_samples += turns.len();

            if !has_curve {
                let net_turn: f64 = turns.iter().sum();
                has_curve = net_turn.abs() >= t.curve_turn_threshold
                    || chord_deviation(&points) >= t.chord_deviation_threshold;
            }
        }

        let intersection = match (has_horizontal_line, has_vertical_line) {
            (true, true) => t.both_lines_intersection,
            (true, false) | (false, true) => t.one_line_intersection,
            (false, false) => 0.0,
        };
        let angle = if turn_samples > 0 {
            turn_total / turn_samples as f64
        } else {
            0.0
        };
        let curve = if has_curve { 1.0 } else { 0.0 };

        let complexity = (t.curve_weight * curve
            + t.intersection_weight * intersection
            + t.angle_weight * angle)
            .clamp(0.0, 1.0);

        FeatureSet {
            has_horizontal_line,
            has_vertical_line,
            has_curve,
            complexity,
        }
    }
}

/// Maps strokes into the unit square of `bbox`. Degenerate boxes leave the
/// coordinates untouched; the flag reports which case applied.
pub fn to_unit_square(strokes: &[Stroke], bbox: &BoundingBox) -> (Vec<Stroke>, bool) {
    if bbox.width > 0.0 && bbox.height > 0.0 {
        (strokes.iter().map(|s| normalize_stroke(s, bbox)).collect(), true)
    } else {
        (strokes.to_vec(), false)
    }
}

fn normalize_stroke(stroke: &Stroke, bbox: &BoundingBox) -> Stroke {
    Stroke::new(
        stroke
            .points
            .iter()
            .map(|p| Point {
                x: (p.x - bbox.x) / bbox.width,
                y: (p.y - bbox.y) / bbox.height,
                timestamp_ms: p.timestamp_ms,
            })
            .collect(),
    )
}

// Keeps every n-th point (plus the last) so run scanning stays bounded.
fn decimate(points: &[Point], max_points: usize) -> Vec<Point> {
    if max_points < 2 || points.len() <= max_points {
        return points.to_vec();
    }
    let step = points.len().div_ceil(max_points);
    let mut out: Vec<Point> = points.iter().step_by(step).copied().collect();
    if let (Some(last), Some(kept)) = (points.last(), out.last()) {
        if last != kept {
            out.push(*last);
        }
    }
    out
}

/// Scans contiguous runs of at least three points for a horizontal or
/// vertical line.
fn detect_lines(points: &[Point], threshold: f64) -> (bool, bool) {
    let mut horizontal = false;
    let mut vertical = false;
    if points.len() < 3 {
        return (false, false);
    }

    for start in 0..points.len() - 2 {
        let first = points[start];
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);

        for (offset, p) in points[start + 1..].iter().enumerate() {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);

            let x_range = max_x - min_x;
            let y_range = max_y - min_y;
            if offset >= 1 {
                let dx = (p.x - first.x).abs();
                let dy = (p.y - first.y).abs();
                horizontal |= dx > threshold && y_range < threshold;
                vertical |= dy > threshold && x_range < threshold;
                if horizontal && vertical {
                    return (true, true);
                }
            }
            // Ranges only grow; once both exceed the threshold no longer run can qualify.
            if x_range >= threshold && y_range >= threshold {
                break;
            }
        }
    }

    (horizontal, vertical)
}

/// Signed direction changes between successive pen movements of at least
/// `min_segment` length.
fn turn_angles(points: &[Point], min_segment: f64) -> Vec<f64> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };

    let mut anchor = first;
    let mut directions = Vec::new();
    for p in &points[1..] {
        if anchor.distance(p) >= min_segment {
            directions.push((p.y - anchor.y).atan2(p.x - anchor.x));
            anchor = *p;
        }
    }

    directions
        .iter()
        .tuple_windows()
        .map(|(a, b)| wrap_angle(b - a))
        .collect()
}

fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Largest perpendicular distance from the start-end chord, over chord length
fn chord_deviation(points: &[Point]) -> f64 {
    let (Some(start), Some(end)) = (points.first(), points.last()) else {
        return 0.0;
    };
    let chord = start.distance(end);
    if points.len() < 3 || chord <= f64::EPSILON {
        return 0.0;
    }

    let (cx, cy) = ((end.x - start.x) / chord, (end.y - start.y) / chord);
    points
        .iter()
        .map(|p| ((p.x - start.x) * cy - (p.y - start.y) * cx).abs())
        .fold(0.0, f64::max)
        / chord
}
