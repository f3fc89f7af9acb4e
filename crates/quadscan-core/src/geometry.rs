//! Quad geometry: centroid-relative expansion, bounds clipping and crop
//! rectangle derivation.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four ordered image-space points (TL, TR, BR, BL as reported by the detector).
pub type Quad = [Point2<f32>; 4];

/// Outward padding applied to located code quads before drawing and cropping.
pub const QUAD_EXPANSION: f32 = 1.1;

/// Arithmetic mean of `points`. Returns the origin for an empty slice.
pub fn centroid(points: &[Point2<f32>]) -> Point2<f32> {
    if points.is_empty() {
        return Point2::origin();
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2::new(sx / n, sy / n)
}

/// Scale every vertex away from the centroid: `c + factor * (p - c)`.
pub fn expand_quad(quad: &Quad, factor: f32) -> Quad {
    let c = centroid(quad);
    quad.map(|p| c + (p - c) * factor)
}

/// Clamp each coordinate into `[0, width - 1] x [0, height - 1]`.
pub fn clip_to_bounds(quad: &Quad, width: u32, height: u32) -> Quad {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    quad.map(|p| Point2::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y)))
}

/// Absolute polygon area (shoelace formula).
pub fn quad_area(quad: &Quad) -> f32 {
    let mut twice = 0.0f32;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        twice += a.x * b.y - b.x * a.y;
    }
    0.5 * twice.abs()
}

/// Axis-aligned crop rectangle with exclusive end coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl CropRect {
    /// True when the rectangle spans no pixels on at least one axis.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    #[inline]
    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }
}

/// Bounding rectangle of `points`: `x0 = floor(min x)`, `x1 = ceil(max x) + 1`,
/// likewise for y.
///
/// An empty slice or any non-finite coordinate yields the all-zero rectangle,
/// which is degenerate. Callers must check [`CropRect::is_degenerate`] before
/// cropping.
pub fn bounding_crop_rect(points: &[Point2<f32>]) -> CropRect {
    if points.is_empty() || points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return CropRect::default();
    }
    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    CropRect {
        x0: min_x.floor() as i64,
        y0: min_y.floor() as i64,
        x1: max_x.ceil() as i64 + 1,
        y1: max_y.ceil() as i64 + 1,
    }
}
