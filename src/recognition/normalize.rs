//! Clean-up passes applied to children's input before lenient scoring:
//! tremor smoothing, gap filling and rescaling of tiny drawings.

use crate::drawing::{BoundingBox, Point, Stroke};
use serde::{Deserialize, Serialize};

/// Constants for the lenient clean-up passes, in raw input units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeTuning {
    /// Consecutive points further apart than this are bridged
    pub gap_distance: f64,
    /// Consecutive points further apart in time than this are bridged
    pub gap_time_ms: i64,
    /// Spacing of the points inserted across a gap
    pub interpolation_step: f64,
    /// Most points inserted across one gap; wider gaps get coarser spacing
    pub max_gap_points: usize,
    /// Drawings whose longer side is below this are scaled up to it
    pub min_drawing_size: f64,
}

impl Default for NormalizeTuning {
    fn default() -> Self {
        Self {
            gap_distance: 30.0,
            gap_time_ms: 120,
            interpolation_step: 10.0,
            max_gap_points: 32,
            min_drawing_size: 80.0,
        }
    }
}

/// Strokes after the clean-up passes, with their bounds
#[derive(Debug, Clone)]
pub struct CleanedStrokes {
    pub strokes: Vec<Stroke>,
    pub bounding_box: BoundingBox,
    pub rescaled: bool,
}

impl CleanedStrokes {
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }

    pub fn path_length(&self) -> f64 {
        self.strokes.iter().map(Stroke::path_length).sum()
    }
}

/// Runs smoothing, gap filling and rescaling in that order.
pub fn clean(strokes: &[Stroke], bbox: &BoundingBox, tuning: &NormalizeTuning) -> CleanedStrokes {
    let filled: Vec<Stroke> = strokes
        .iter()
        .map(smooth_jitter)
        .map(|s| fill_gaps(&s, tuning))
        .collect();
    let bounds = BoundingBox::from_strokes(&filled).unwrap_or(*bbox);
    let (strokes, bounding_box, rescaled) = rescale_small(filled, bounds, tuning.min_drawing_size);
    CleanedStrokes {
        strokes,
        bounding_box,
        rescaled,
    }
}

/// Averages every interior point with its two neighbours.
pub fn smooth_jitter(stroke: &Stroke) -> Stroke {
    let points = &stroke.points;
    if points.len() < 3 {
        return stroke.clone();
    }

    let mut smoothed = Vec::with_capacity(points.len());
    smoothed.push(points[0]);
    for w in points.windows(3) {
        smoothed.push(Point {
            x: (w[0].x + w[1].x + w[2].x) / 3.0,
            y: (w[0].y + w[1].y + w[2].y) / 3.0,
            timestamp_ms: w[1].timestamp_ms,
        });
    }
    smoothed.push(points[points.len() - 1]);
    Stroke::new(smoothed)
}

/// Inserts evenly spaced points across large spatial or temporal gaps
/// between consecutive samples.
pub fn fill_gaps(stroke: &Stroke, tuning: &NormalizeTuning) -> Stroke {
    let points = &stroke.points;
    let Some(&first) = points.first() else {
        return stroke.clone();
    };

    let mut filled = vec![first];
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dist = a.distance(&b);
        let is_gap =
            dist > tuning.gap_distance || b.timestamp_ms - a.timestamp_ms > tuning.gap_time_ms;

        if is_gap
            && dist.is_finite()
            && tuning.interpolation_step > 0.0
            && dist > tuning.interpolation_step
        {
            let steps = ((dist / tuning.interpolation_step).ceil() as usize)
                .min(tuning.max_gap_points.saturating_add(1));
            for i in 1..steps {
                let t = i as f64 / steps as f64;
                filled.push(Point {
                    x: a.x + (b.x - a.x) * t,
                    y: a.y + (b.y - a.y) * t,
                    timestamp_ms: a.timestamp_ms
                        + ((b.timestamp_ms - a.timestamp_ms) as f64 * t) as i64,
                });
            }
        }
        filled.push(b);
    }
    Stroke::new(filled)
}

/// Scales a drawing about its center so its longer side reaches `min_size`.
/// Drawings that are already large enough, or have no extent, are untouched.
pub fn rescale_small(
    strokes: Vec<Stroke>,
    bbox: BoundingBox,
    min_size: f64,
) -> (Vec<Stroke>, BoundingBox, bool) {
    let Some(bounds) = enlarged(&bbox, min_size) else {
        return (strokes, bbox, false);
    };

    let factor = min_size / bbox.width.max(bbox.height);
    let (cx, cy) = (bbox.center_x, bbox.center_y);
    let scaled: Vec<Stroke> = strokes
        .into_iter()
        .map(|s| {
            Stroke::new(
                s.points
                    .into_iter()
                    .map(|p| Point {
                        x: cx + (p.x - cx) * factor,
                        y: cy + (p.y - cy) * factor,
                        timestamp_ms: p.timestamp_ms,
                    })
                    .collect(),
            )
        })
        .collect();
    (scaled, bounds, true)
}

/// Bounds of `bbox` scaled about its center so the longer side reaches
/// `min_size`, or `None` when no enlargement applies.
pub fn enlarged(bbox: &BoundingBox, min_size: f64) -> Option<BoundingBox> {
    let longest = bbox.width.max(bbox.height);
    if longest <= 0.0 || longest >= min_size {
        return None;
    }
    let factor = min_size / longest;
    let width = bbox.width * factor;
    let height = bbox.height * factor;
    Some(BoundingBox::from_extent(
        bbox.center_x - width / 2.0,
        bbox.center_y - height / 2.0,
        width,
        height,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: &[(f64, f64, i64)]) -> Stroke {
        Stroke::new(points.iter().map(|&(x, y, t)| Point::new(x, y, t)).collect())
    }

    #[test]
    fn smoothing_dampens_tremor() {
        let jittery = stroke(&[(0.0, 0.0, 0), (10.0, 6.0, 10), (20.0, -6.0, 20), (30.0, 0.0, 30)]);
        let smoothed = smooth_jitter(&jittery);
        assert_eq!(smoothed.points.len(), 4);
        assert_eq!(smoothed.points[0], jittery.points[0]);
        assert_eq!(smoothed.points[3], jittery.points[3]);
        assert!(smoothed.points[1].y.abs() < 6.0);
        assert!(smoothed.points[2].y.abs() < 6.0);
    }

    #[test]
    fn short_strokes_are_not_smoothed() {
        let s = stroke(&[(0.0, 0.0, 0), (5.0, 5.0, 5)]);
        assert_eq!(smooth_jitter(&s), s);
    }

    #[test]
    fn spatial_gaps_are_bridged() {
        let tuning = NormalizeTuning::default();
        let s = stroke(&[(0.0, 0.0, 0), (100.0, 0.0, 10)]);
        let filled = fill_gaps(&s, &tuning);
        assert_eq!(filled.points.len(), 11);
        assert_eq!(filled.points[5].x, 50.0);
        assert!(filled
            .points
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn huge_gaps_insert_a_bounded_number_of_points() {
        let tuning = NormalizeTuning::default();
        let s = stroke(&[(0.0, 0.0, 0), (1e12, 1e12, 10)]);
        let filled = fill_gaps(&s, &tuning);
        assert_eq!(filled.points.len(), tuning.max_gap_points + 2);
        assert_eq!(filled.points.last(), s.points.last());
        assert!(filled.points.windows(2).all(|w| w[0].x < w[1].x));

        // the span overflows to infinity, so nothing sensible can be inserted
        let wide = stroke(&[(-1e308, 0.0, 0), (1e308, 0.0, 10)]);
        assert_eq!(fill_gaps(&wide, &tuning), wide);
    }

    #[test]
    fn temporal_gaps_are_bridged() {
        let tuning = NormalizeTuning::default();
        let s = stroke(&[(0.0, 0.0, 0), (25.0, 0.0, 500)]);
        assert_eq!(fill_gaps(&s, &tuning).points.len(), 4);

        let dense = stroke(&[(0.0, 0.0, 0), (5.0, 0.0, 10)]);
        assert_eq!(fill_gaps(&dense, &tuning).points.len(), 2);
    }

    #[test]
    fn tiny_drawings_are_scaled_up_around_center() {
        let s = vec![stroke(&[(100.0, 100.0, 0), (120.0, 110.0, 10)])];
        let bbox = BoundingBox::from_strokes(&s).unwrap();
        let (scaled, bounds, rescaled) = rescale_small(s, bbox, 80.0);
        assert!(rescaled);
        assert_eq!(bounds.width, 80.0);
        assert_eq!(bounds.height, 40.0);
        assert_eq!(bounds.center_x, bbox.center_x);
        assert_eq!(scaled[0].points[0].x, 70.0);
    }

    #[test]
    fn enlarged_keeps_center_and_aspect() {
        let bbox = BoundingBox::from_extent(10.0, 10.0, 20.0, 5.0);
        let big = enlarged(&bbox, 80.0).unwrap();
        assert_eq!((big.width, big.height), (80.0, 20.0));
        assert_eq!((big.center_x, big.center_y), (bbox.center_x, bbox.center_y));
        assert!(enlarged(&BoundingBox::from_extent(0.0, 0.0, 90.0, 1.0), 80.0).is_none());
    }

    #[test]
    fn large_or_pointlike_drawings_are_untouched() {
        let big = vec![stroke(&[(0.0, 0.0, 0), (200.0, 50.0, 10)])];
        let bbox = BoundingBox::from_strokes(&big).unwrap();
        assert!(!rescale_small(big, bbox, 80.0).2);

        let dot = vec![stroke(&[(5.0, 5.0, 0)])];
        let bbox = BoundingBox::from_strokes(&dot).unwrap();
        assert!(!rescale_small(dot, bbox, 80.0).2);
    }

    #[test]
    fn clean_reports_path_and_points() {
        let s = vec![stroke(&[(0.0, 0.0, 0), (100.0, 0.0, 10)])];
        let bbox = BoundingBox::from_strokes(&s).unwrap();
        let cleaned = clean(&s, &bbox, &NormalizeTuning::default());
        assert_eq!(cleaned.point_count(), 11);
        assert!((cleaned.path_length() - 100.0).abs() < 1e-9);
        assert!(!cleaned.rescaled);
    }
}
