//! Quadrilateral code locator: detect, decode, expand, crop.
//!
//! The engine is injected through [`CodeEngine`]. It reports candidates with
//! an optional quad plus opaque metadata; decoding is a second call that gets
//! the same candidate back.

mod rqrr_engine;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use quadscan_core::{
    bounding_crop_rect, clip_to_bounds, crop, draw_closed_polygon, expand_quad, payload, CropRect,
    Quad, Raster, CODE_OUTLINE_COLOR, CODE_OUTLINE_THICKNESS, QUAD_EXPANSION,
};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

pub use rqrr_engine::RqrrCodeEngine;

/// Engine-private data attached to a candidate.
pub struct CandidateMeta(Box<dyn Any + Send>);

impl CandidateMeta {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn empty() -> Self {
        Self(Box::new(()))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for CandidateMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CandidateMeta(..)")
    }
}

/// A located region that may or may not hold a readable code.
#[derive(Debug)]
pub struct CodeCandidate {
    /// Corner points in source-image space, if the engine reports them.
    pub quad: Option<Quad>,
    pub meta: CandidateMeta,
}

#[derive(thiserror::Error, Debug)]
pub enum CodeEngineError {
    #[error("code engine '{engine}' failed: {message}")]
    Engine { engine: &'static str, message: String },
}

/// Detector-native code capability.
pub trait CodeEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Locate every candidate code region in `raster`.
    fn detect(&self, raster: &Raster) -> Result<Vec<CodeCandidate>, CodeEngineError>;

    /// Decode a candidate previously returned by [`CodeEngine::detect`].
    /// `None` means the region is not a readable code.
    fn decode(&self, raster: &Raster, candidate: &CodeCandidate) -> Option<String>;
}

/// One confirmed, decoded and cropped code.
#[derive(Clone, Debug, Serialize)]
pub struct CodeFinding {
    /// Quad as reported by the engine.
    pub quad: Quad,
    /// Expanded and clipped quad used for drawing and cropping.
    pub region: Quad,
    pub text: Option<String>,
    /// Structured payload when `text` is hex(zlib(json)).
    pub record: Option<serde_json::Value>,
    pub crop_rect: CropRect,
    /// Pixels under `crop_rect`, taken from the undrawn input.
    #[serde(skip)]
    pub crop: Raster,
}

/// Output of [`CodeLocator::locate`].
///
/// `annotated` borrows the input when nothing was drawn.
#[derive(Debug)]
pub struct CodeScan<'a> {
    pub annotated: Cow<'a, Raster>,
    pub findings: Vec<CodeFinding>,
}

impl CodeScan<'_> {
    /// True when no outline was drawn and `annotated` is the input itself.
    pub fn is_unmodified(&self) -> bool {
        matches!(self.annotated, Cow::Borrowed(_))
    }
}

pub struct CodeLocator {
    engine: Box<dyn CodeEngine>,
    expansion: f32,
}

impl CodeLocator {
    pub fn new(engine: Box<dyn CodeEngine>) -> Self {
        Self {
            engine,
            expansion: QUAD_EXPANSION,
        }
    }

    pub fn with_expansion(mut self, factor: f32) -> Self {
        self.expansion = factor;
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run detect, decode, geometry and crop over one raster.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    pub fn locate<'a>(&self, raster: &'a Raster) -> Result<CodeScan<'a>, CodeEngineError> {
        let candidates = self.engine.detect(raster)?;
        let mut scan = CodeScan {
            annotated: Cow::Borrowed(raster),
            findings: Vec::new(),
        };
        if candidates.is_empty() {
            log::info!("no codes found ({} engine)", self.engine.name());
            return Ok(scan);
        }
        log::info!("found {} potential code(s)", candidates.len());

        let (width, height) = raster.dimensions();
        for (i, candidate) in candidates.iter().enumerate() {
            let n = i + 1;
            let Some(text) = self.engine.decode(raster, candidate) else {
                log::debug!("candidate #{n} located but not decodable, skipped");
                continue;
            };
            let Some(quad) = candidate.quad else {
                log::warn!("code #{n} decoded but has no corners, cannot draw or crop");
                continue;
            };
            if quad.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                log::warn!("code #{n} has non-finite corners, skipped");
                continue;
            }
            log::info!("code #{n} decoded: '{}'", preview(&text));

            let region = clip_to_bounds(&expand_quad(&quad, self.expansion), width, height);
            draw_closed_polygon(
                scan.annotated.to_mut(),
                &region,
                CODE_OUTLINE_COLOR,
                CODE_OUTLINE_THICKNESS,
            );

            let crop_rect = bounding_crop_rect(&region);
            if crop_rect.is_degenerate() {
                log::info!("code #{n} has a degenerate crop rectangle, not reported");
                continue;
            }
            let Some(pixels) = crop(raster, &crop_rect) else {
                log::info!("code #{n} produced an empty crop, not reported");
                continue;
            };
            let record = payload::try_decode(&text);
            scan.findings.push(CodeFinding {
                quad,
                region,
                text: Some(text),
                record,
                crop_rect,
                crop: pixels,
            });
        }
        Ok(scan)
    }
}

fn preview(text: &str) -> Cow<'_, str> {
    const MAX: usize = 50;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &text[..idx])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use nalgebra::Point2;

    /// Candidates carry their payload as metadata; `None` means undecodable.
    struct ScriptedEngine(Vec<(Option<Quad>, Option<&'static str>)>);

    impl CodeEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect(&self, _raster: &Raster) -> Result<Vec<CodeCandidate>, CodeEngineError> {
            Ok(self
                .0
                .iter()
                .map(|(quad, text)| CodeCandidate {
                    quad: *quad,
                    meta: CandidateMeta::new(*text),
                })
                .collect())
        }

        fn decode(&self, _raster: &Raster, c: &CodeCandidate) -> Option<String> {
            c.meta
                .downcast_ref::<Option<&'static str>>()
                .copied()
                .flatten()
                .map(str::to_owned)
        }
    }

    fn square(x: f32, y: f32, side: f32) -> Quad {
        [
            Point2::new(x, y),
            Point2::new(x + side, y),
            Point2::new(x + side, y + side),
            Point2::new(x, y + side),
        ]
    }

    fn canvas() -> Raster {
        RgbImage::from_pixel(100, 80, Rgb([200, 200, 200]))
    }

    #[test]
    fn zero_candidates_borrow_the_input() {
        let img = canvas();
        let scan = CodeLocator::new(Box::new(ScriptedEngine(vec![])))
            .locate(&img)
            .unwrap();
        assert!(scan.is_unmodified());
        assert!(std::ptr::eq(&*scan.annotated, &img));
        assert!(scan.findings.is_empty());
    }

    #[test]
    fn undecodable_candidates_draw_nothing() {
        let img = canvas();
        let engine = ScriptedEngine(vec![(Some(square(10.0, 10.0, 20.0)), None)]);
        let scan = CodeLocator::new(Box::new(engine)).locate(&img).unwrap();
        assert!(scan.is_unmodified());
        assert!(scan.findings.is_empty());
    }

    #[test]
    fn decoded_candidate_is_outlined_and_cropped_from_clean_input() {
        let img = canvas();
        let engine = ScriptedEngine(vec![
            (Some(square(20.0, 20.0, 20.0)), Some("hello")),
            (None, Some("no corners")),
        ]);
        let scan = CodeLocator::new(Box::new(engine)).locate(&img).unwrap();
        assert!(!scan.is_unmodified());
        assert_eq!(scan.findings.len(), 1);

        let f = &scan.findings[0];
        assert_eq!(f.text.as_deref(), Some("hello"));
        assert!(f.record.is_none());
        // 10% expansion of a 20 px square centred at (30, 30): 19..41.
        assert_eq!(
            f.crop_rect,
            CropRect {
                x0: 19,
                y0: 19,
                x1: 42,
                y1: 42
            }
        );
        assert_eq!(f.crop.dimensions(), (23, 23));
        assert!(f.crop.pixels().all(|p| *p == Rgb([200, 200, 200])));
        assert_eq!(scan.annotated.get_pixel(30, 19), &CODE_OUTLINE_COLOR);
        assert_eq!(img.get_pixel(30, 19), &Rgb([200, 200, 200]));
    }

    #[test]
    fn payload_text_yields_record() {
        let doc = serde_json::json!({"id": 3, "tag": "board-A"});
        let text: &'static str = Box::leak(payload::encode(&doc).unwrap().into_boxed_str());
        let img = canvas();
        let engine = ScriptedEngine(vec![(Some(square(5.0, 5.0, 30.0)), Some(text))]);
        let scan = CodeLocator::new(Box::new(engine)).locate(&img).unwrap();
        assert_eq!(scan.findings[0].record.as_ref(), Some(&doc));
    }

    #[test]
    fn quads_outside_the_image_collapse_to_a_one_pixel_crop() {
        let img = canvas();
        let engine = ScriptedEngine(vec![(Some(square(500.0, 500.0, 10.0)), Some("far"))]);
        let scan = CodeLocator::new(Box::new(engine)).locate(&img).unwrap();
        // Clipping collapses the quad onto the bottom-right pixel, which is
        // still a one-pixel crop.
        assert_eq!(scan.findings.len(), 1);
        assert_eq!(scan.findings[0].crop.dimensions(), (1, 1));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 53);
        assert_eq!(preview("short"), "short");
    }
}
