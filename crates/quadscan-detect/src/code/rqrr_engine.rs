use nalgebra::Point2;
use quadscan_core::{to_gray, Quad, Raster};
use rqrr::BitGrid;

use super::{CandidateMeta, CodeCandidate, CodeEngine, CodeEngineError};

/// QR engine backed by `rqrr`.
///
/// Detection samples each grid into an owned bit matrix so decoding can run
/// later without holding on to the prepared image.
#[derive(Clone, Copy, Debug, Default)]
pub struct RqrrCodeEngine;

struct SampledGrid {
    size: usize,
    bits: Vec<bool>,
}

impl BitGrid for SampledGrid {
    fn size(&self) -> usize {
        self.size
    }

    fn bit(&self, y: usize, x: usize) -> bool {
        self.bits[y * self.size + x]
    }
}

fn sample<G: BitGrid>(grid: &G) -> SampledGrid {
    let size = grid.size();
    let mut bits = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            bits.push(grid.bit(y, x));
        }
    }
    SampledGrid { size, bits }
}

fn bounds_to_quad(bounds: &[rqrr::Point; 4]) -> Quad {
    bounds.map(|p| Point2::new(p.x as f32, p.y as f32))
}

impl CodeEngine for RqrrCodeEngine {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn detect(&self, raster: &Raster) -> Result<Vec<CodeCandidate>, CodeEngineError> {
        let gray = to_gray(raster);
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        if w == 0 || h == 0 {
            return Ok(Vec::new());
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            gray.get_pixel(x as u32, y as u32)[0]
        });
        let candidates = prepared
            .detect_grids()
            .into_iter()
            .map(|g| CodeCandidate {
                quad: Some(bounds_to_quad(&g.bounds)),
                meta: CandidateMeta::new(rqrr::Grid {
                    grid: sample(&g.grid),
                    bounds: g.bounds,
                }),
            })
            .collect();
        Ok(candidates)
    }

    fn decode(&self, _raster: &Raster, candidate: &CodeCandidate) -> Option<String> {
        let grid = candidate.meta.downcast_ref::<rqrr::Grid<SampledGrid>>()?;
        match grid.decode() {
            Ok((_, text)) => Some(text),
            Err(err) => {
                log::debug!("rqrr decode failed: {err:?}");
                None
            }
        }
    }
}
