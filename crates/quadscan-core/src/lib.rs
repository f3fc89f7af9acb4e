//! Core types and utilities shared by the quadscan crates.
//!
//! This crate is intentionally small: raster helpers built on `image`,
//! quad geometry on `nalgebra` points, annotation drawing, the hex/zlib/JSON
//! payload codec, and a minimal logger. It knows nothing about detectors or
//! image sources.

mod draw;
mod geometry;
mod raster;
mod logger;
pub mod payload;

pub use draw::{
    draw_closed_polygon, draw_corner_marks, draw_marker_outline, BOARD_CORNER_COLOR,
    CODE_OUTLINE_COLOR, CODE_OUTLINE_THICKNESS, MARKER_OUTLINE_COLOR,
};
pub use geometry::{
    bounding_crop_rect, centroid, clip_to_bounds, expand_quad, quad_area, CropRect, Quad,
    QUAD_EXPANSION,
};
pub use raster::{
    crop, decode_raster, encode_jpeg, open_raster, to_gray, write_raster, Raster, RasterError,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
