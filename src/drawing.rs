use serde::{Deserialize, Serialize};

/// One sampled pen/touch position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub timestamp_ms: i64,
}

impl Point {
    pub fn new(x: f64, y: f64, timestamp_ms: i64) -> Self {
        Self { x, y, timestamp_ms }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One continuous contact segment: pen down to pen up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Sum of segment lengths along the stroke
    pub fn path_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }

    /// Drops non-finite points and clamps timestamps so they never go backwards.
    fn sanitized(self) -> Option<Stroke> {
        let mut last_ts = i64::MIN;
        let points: Vec<Point> = self
            .points
            .into_iter()
            .filter(Point::is_finite)
            .map(|mut p| {
                p.timestamp_ms = p.timestamp_ms.max(last_ts);
                last_ts = p.timestamp_ms;
                p
            })
            .collect();

        if points.is_empty() {
            None
        } else {
            Some(Stroke { points })
        }
    }
}

/// Axis-aligned bounds of a set of strokes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl BoundingBox {
    pub fn from_strokes(strokes: &[Stroke]) -> Option<Self> {
        let mut points = strokes.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some(Self::from_extent(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn from_extent(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            center_x: x + width / 2.0,
            center_y: y + height / 2.0,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt()
    }

    /// Long side over short side; `None` when either side is zero.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let short = self.width.min(self.height);
        if short <= 0.0 {
            None
        } else {
            Some(self.width.max(self.height) / short)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mouse,
    Touch,
    Pen,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Size of the surface the drawing was captured on, when the caller knows it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

/// Everything captured for a single attempt.
///
/// The bounding box is kept in sync with the strokes: it is recomputed on
/// every [`DrawingData::add_stroke`] and is `None` exactly when there are no
/// strokes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDrawing")]
pub struct DrawingData {
    strokes: Vec<Stroke>,
    bounding_box: Option<BoundingBox>,
    pub device: DeviceType,
    pub canvas: Option<Canvas>,
}

impl DrawingData {
    pub fn new(device: DeviceType) -> Self {
        Self {
            device,
            ..Default::default()
        }
    }

    pub fn from_strokes(strokes: Vec<Stroke>, device: DeviceType) -> Self {
        let mut drawing = Self::new(device);
        for stroke in strokes {
            drawing.add_stroke(stroke);
        }
        drawing
    }

    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        if width > 0.0 && height > 0.0 {
            self.canvas = Some(Canvas { width, height });
        }
        self
    }

    /// Appends a stroke; strokes with no usable points are ignored.
    pub fn add_stroke(&mut self, stroke: Stroke) {
        if let Some(stroke) = stroke.sanitized() {
            self.strokes.push(stroke);
            self.bounding_box = BoundingBox::from_strokes(&self.strokes);
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(|s| s.points.len()).sum()
    }
}

// Wire shape accepted from capture layers; every field is optional so a
// partially-filled object still produces a usable drawing.
#[derive(Deserialize)]
struct RawDrawing {
    #[serde(default)]
    strokes: Vec<Stroke>,
    #[serde(default)]
    device: DeviceType,
    #[serde(default)]
    canvas: Option<Canvas>,
}

impl From<RawDrawing> for DrawingData {
    fn from(raw: RawDrawing) -> Self {
        let drawing = DrawingData::from_strokes(raw.strokes, raw.device);
        match raw.canvas {
            Some(c) => drawing.with_canvas(c.width, c.height),
            None => drawing,
        }
    }
}
