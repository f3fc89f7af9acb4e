//! Annotation drawing on RGB rasters.

use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use nalgebra::Point2;

use crate::raster::Raster;

/// Stroke colour for confirmed code outlines.
pub const CODE_OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Stroke width in pixels for confirmed code outlines.
pub const CODE_OUTLINE_THICKNESS: u32 = 4;
/// Interpolated board corners.
pub const BOARD_CORNER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Raw marker outlines; must differ from [`BOARD_CORNER_COLOR`].
pub const MARKER_OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const CORNER_MARK_HALF: i32 = 3;

/// Draw a closed polygon with a stroke `thickness` pixels wide.
///
/// Each edge is rendered as a band of parallel one-pixel segments offset
/// along the edge normal; vertices get a filled disc so joins have no gaps.
pub fn draw_closed_polygon(
    raster: &mut Raster,
    points: &[Point2<f32>],
    color: Rgb<u8>,
    thickness: u32,
) {
    if points.len() < 2 {
        return;
    }
    let thickness = thickness.max(1);
    let half = (thickness as f32 - 1.0) * 0.5;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dir = b - a;
        let len = dir.norm();
        if len <= f32::EPSILON {
            continue;
        }
        let normal = nalgebra::Vector2::new(-dir.y / len, dir.x / len);
        for step in 0..thickness {
            let off = normal * (step as f32 - half);
            draw_line_segment_mut(
                raster,
                (a.x + off.x, a.y + off.y),
                (b.x + off.x, b.y + off.y),
                color,
            );
        }
    }
    if thickness > 2 {
        let radius = (thickness / 2) as i32;
        for p in points {
            draw_filled_circle_mut(raster, (p.x.round() as i32, p.y.round() as i32), radius, color);
        }
    }
}

/// Draw a small hollow square centred on each corner.
pub fn draw_corner_marks(raster: &mut Raster, corners: &[Point2<f32>], color: Rgb<u8>) {
    let side = (2 * CORNER_MARK_HALF + 1) as u32;
    for c in corners {
        if !c.x.is_finite() || !c.y.is_finite() {
            continue;
        }
        let x = c.x.round() as i32 - CORNER_MARK_HALF;
        let y = c.y.round() as i32 - CORNER_MARK_HALF;
        draw_hollow_rect_mut(raster, Rect::at(x, y).of_size(side, side), color);
    }
}

/// One-pixel outline around a detected marker.
pub fn draw_marker_outline(raster: &mut Raster, outline: &[Point2<f32>; 4], color: Rgb<u8>) {
    draw_closed_polygon(raster, outline, color, 1);
}
