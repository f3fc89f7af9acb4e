use calib_targets::aruco::builtins::builtin_dictionary;
use calib_targets::charuco::{CharucoBoardSpec, CharucoParams, MarkerLayout};
use calib_targets::detect::{detect_charuco, DetectError};
use quadscan_core::{to_gray, Raster};

use super::{BoardCorner, BoardDescriptor, BoardEngine, BoardError, BoardObservation, MarkerObservation};

/// ChArUco engine backed by `calib-targets`.
///
/// Markers carry image-space outlines when the detector decoded them from
/// grid cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalibTargetsBoardEngine;

impl CalibTargetsBoardEngine {
    fn params(board: &BoardDescriptor) -> Result<CharucoParams, BoardError> {
        let name = board.dictionary().to_string();
        let dictionary = builtin_dictionary(&name).ok_or(BoardError::UnknownDictionary(name))?;
        let spec = CharucoBoardSpec {
            rows: board.rows(),
            cols: board.columns(),
            cell_size: board.cell_size(),
            marker_size_rel: board.marker_size_rel(),
            dictionary,
            marker_layout: MarkerLayout::OpenCvCharuco,
        };
        Ok(CharucoParams::for_board(&spec))
    }
}

impl BoardEngine for CalibTargetsBoardEngine {
    fn name(&self) -> &'static str {
        "calib-targets"
    }

    fn detect(
        &self,
        raster: &Raster,
        board: &BoardDescriptor,
    ) -> Result<BoardObservation, BoardError> {
        let params = Self::params(board)?;
        let gray = to_gray(raster);
        match detect_charuco(&gray, &params) {
            Ok(res) => Ok(BoardObservation {
                corners: res
                    .detection
                    .corners
                    .iter()
                    .filter_map(|c| {
                        c.id.map(|id| BoardCorner {
                            id,
                            position: c.position,
                        })
                    })
                    .collect(),
                markers: res
                    .markers
                    .iter()
                    .map(|m| MarkerObservation {
                        id: m.id,
                        outline: m.corners_img,
                    })
                    .collect(),
            }),
            // Detector-level misses mean "no board", not an engine fault.
            Err(DetectError::CharucoDetect(err)) => {
                log::debug!("charuco detector found no board: {err}");
                Ok(BoardObservation::default())
            }
            Err(err) => Err(BoardError::Engine {
                engine: "calib-targets",
                message: err.to_string(),
            }),
        }
    }
}
