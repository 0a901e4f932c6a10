//! Shared annotation ink.
//!
//! Strokes are kept as vectors in normalized slide coordinates. Turning them
//! into pixels is the renderer's business.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{Origin, decode_pointer};

/// Default stroke color (hex RGB).
pub const DEFAULT_INK_COLOR: &str = "#e11d48";
/// Default stroke width in logical pixels.
pub const DEFAULT_INK_WIDTH: f64 = 4.0;

/// A finished freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: String,
    pub origin: Origin,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
    /// Eraser strokes remove ink underneath them when rasterized.
    #[serde(default)]
    pub eraser: bool,
}

impl Stroke {
    /// Start a stroke at a normalized position.
    pub fn begin(origin: Origin, start: Point, eraser: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            origin,
            points: vec![start],
            color: DEFAULT_INK_COLOR.to_string(),
            width: DEFAULT_INK_WIDTH,
            eraser,
        }
    }

    /// Append a point, skipping exact repeats.
    pub fn push(&mut self, point: Point) {
        if self.points.last() != Some(&point) {
            self.points.push(point);
        }
    }
}

/// Ordered strokes for the current slide.
#[derive(Debug, Clone, Default)]
pub struct InkLayer {
    strokes: Vec<Stroke>,
}

impl InkLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stroke received from the bus. Duplicate deliveries are ignored.
    ///
    /// Points outside the unit square are dropped; a stroke left with no
    /// points is rejected.
    pub fn apply_stroke(&mut self, mut stroke: Stroke) -> bool {
        if self.strokes.iter().any(|s| s.id == stroke.id) {
            return false;
        }
        stroke.points.retain(|p| decode_pointer(p.x, p.y).is_some());
        if stroke.points.is_empty() {
            return false;
        }
        self.strokes.push(stroke);
        true
    }

    /// Remove all ink. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_ink = !self.strokes.is_empty();
        self.strokes.clear();
        had_ink
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }
}
