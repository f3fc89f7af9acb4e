//! Calibration-board locator.
//!
//! A board is a `columns x rows` grid of square cells; white cells carry a
//! fiducial marker from a named dictionary. The engine reports interpolated
//! board corners and raw markers. Only corners confirm the board: a marker
//! list with zero corners is a non-match.

#[cfg(feature = "charuco")]
mod calib_engine;

use std::fmt;
use std::str::FromStr;

use quadscan_core::{
    draw_corner_marks, draw_marker_outline, Quad, Raster, BOARD_CORNER_COLOR, MARKER_OUTLINE_COLOR,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[cfg(feature = "charuco")]
pub use calib_engine::CalibTargetsBoardEngine;

#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("unknown marker dictionary '{0}'")]
    UnknownDictionary(String),
    #[error("board needs at least 2 columns and 2 rows (got {columns}x{rows})")]
    InvalidSize { columns: u32, rows: u32 },
    #[error("cell size must be positive (got {0})")]
    InvalidCellSize(f32),
    #[error("marker size must be in (0, cell size] (got {marker} for cell {cell})")]
    InvalidMarkerSize { marker: f32, cell: f32 },
    #[error("board engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("board engine '{engine}' failed: {message}")]
    Engine { engine: &'static str, message: String },
}

/// Marker bit layout family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerFamily {
    Aruco { bits: u8, size: u16 },
    ArucoOriginal,
    AprilTag16h5,
    AprilTag25h9,
    AprilTag36h10,
    AprilTag36h11,
}

/// A marker dictionary identified by its OpenCV-style name, e.g. `DICT_4X4_100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerDictionary {
    family: MarkerFamily,
}

impl MarkerDictionary {
    pub fn family(&self) -> MarkerFamily {
        self.family
    }

    /// Inner bits per marker side.
    pub fn marker_bits(&self) -> u8 {
        match self.family {
            MarkerFamily::Aruco { bits, .. } => bits,
            MarkerFamily::ArucoOriginal => 5,
            MarkerFamily::AprilTag16h5 => 4,
            MarkerFamily::AprilTag25h9 => 5,
            MarkerFamily::AprilTag36h10 | MarkerFamily::AprilTag36h11 => 6,
        }
    }
}

impl FromStr for MarkerDictionary {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let unknown = || BoardError::UnknownDictionary(name.to_string());
        let family = match name {
            "DICT_ARUCO_ORIGINAL" => MarkerFamily::ArucoOriginal,
            "DICT_APRILTAG_16h5" => MarkerFamily::AprilTag16h5,
            "DICT_APRILTAG_25h9" => MarkerFamily::AprilTag25h9,
            "DICT_APRILTAG_36h10" => MarkerFamily::AprilTag36h10,
            "DICT_APRILTAG_36h11" => MarkerFamily::AprilTag36h11,
            _ => {
                let rest = name.strip_prefix("DICT_").ok_or_else(unknown)?;
                let (shape, size) = rest.split_once('_').ok_or_else(unknown)?;
                let bits = match shape {
                    "4X4" => 4,
                    "5X5" => 5,
                    "6X6" => 6,
                    "7X7" => 7,
                    _ => return Err(unknown()),
                };
                let size = match size {
                    "50" => 50,
                    "100" => 100,
                    "250" => 250,
                    "1000" => 1000,
                    _ => return Err(unknown()),
                };
                MarkerFamily::Aruco { bits, size }
            }
        };
        Ok(Self { family })
    }
}

impl fmt::Display for MarkerDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            MarkerFamily::Aruco { bits, size } => write!(f, "DICT_{bits}X{bits}_{size}"),
            MarkerFamily::ArucoOriginal => f.write_str("DICT_ARUCO_ORIGINAL"),
            MarkerFamily::AprilTag16h5 => f.write_str("DICT_APRILTAG_16h5"),
            MarkerFamily::AprilTag25h9 => f.write_str("DICT_APRILTAG_25h9"),
            MarkerFamily::AprilTag36h10 => f.write_str("DICT_APRILTAG_36h10"),
            MarkerFamily::AprilTag36h11 => f.write_str("DICT_APRILTAG_36h11"),
        }
    }
}

/// Physical board layout as configured. Sizes share one unit (millimetres
/// by convention).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardGeometry {
    pub columns: u32,
    pub rows: u32,
    pub cell_size: f32,
    pub marker_size: f32,
    pub dictionary: String,
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            columns: 5,
            rows: 5,
            cell_size: 10.0,
            marker_size: 7.0,
            dictionary: "DICT_4X4_100".to_string(),
        }
    }
}

/// Validated, immutable board description handed to engines.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardDescriptor {
    columns: u32,
    rows: u32,
    cell_size: f32,
    marker_size: f32,
    dictionary: MarkerDictionary,
}

impl BoardDescriptor {
    pub fn new(geometry: &BoardGeometry) -> Result<Self, BoardError> {
        let dictionary: MarkerDictionary = geometry.dictionary.parse()?;
        if geometry.columns < 2 || geometry.rows < 2 {
            return Err(BoardError::InvalidSize {
                columns: geometry.columns,
                rows: geometry.rows,
            });
        }
        if !(geometry.cell_size > 0.0 && geometry.cell_size.is_finite()) {
            return Err(BoardError::InvalidCellSize(geometry.cell_size));
        }
        if !(geometry.marker_size > 0.0 && geometry.marker_size <= geometry.cell_size) {
            return Err(BoardError::InvalidMarkerSize {
                marker: geometry.marker_size,
                cell: geometry.cell_size,
            });
        }
        Ok(Self {
            columns: geometry.columns,
            rows: geometry.rows,
            cell_size: geometry.cell_size,
            marker_size: geometry.marker_size,
            dictionary,
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn marker_size(&self) -> f32 {
        self.marker_size
    }

    /// Marker side as a fraction of the cell side, in `(0, 1]`.
    pub fn marker_size_rel(&self) -> f32 {
        self.marker_size / self.cell_size
    }

    pub fn dictionary(&self) -> MarkerDictionary {
        self.dictionary
    }

    /// Number of inner corners a full detection can interpolate.
    pub fn inner_corner_count(&self) -> usize {
        ((self.columns - 1) * (self.rows - 1)) as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoardCorner {
    pub id: u32,
    pub position: nalgebra::Point2<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarkerObservation {
    pub id: u32,
    /// Image-space outline when the engine reports one.
    pub outline: Option<Quad>,
}

/// Raw engine output: interpolated corners with ids, and markers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoardObservation {
    pub corners: Vec<BoardCorner>,
    pub markers: Vec<MarkerObservation>,
}

/// Combined marker detection plus corner interpolation.
pub trait BoardEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// An empty observation means no board; errors are reserved for engine
    /// failures.
    fn detect(
        &self,
        raster: &Raster,
        board: &BoardDescriptor,
    ) -> Result<BoardObservation, BoardError>;
}

/// Stand-in used when no board engine is compiled in.
#[derive(Clone, Debug)]
pub struct UnavailableBoardEngine {
    reason: String,
}

impl UnavailableBoardEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableBoardEngine {
    fn default() -> Self {
        Self::new("built without the `charuco` feature")
    }
}

impl BoardEngine for UnavailableBoardEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn detect(&self, _: &Raster, _: &BoardDescriptor) -> Result<BoardObservation, BoardError> {
        Err(BoardError::EngineUnavailable(self.reason.clone()))
    }
}

/// The board engine this build ships with.
pub fn default_board_engine() -> Box<dyn BoardEngine> {
    #[cfg(feature = "charuco")]
    {
        Box::new(CalibTargetsBoardEngine::default())
    }
    #[cfg(not(feature = "charuco"))]
    {
        Box::new(UnavailableBoardEngine::default())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardFinding {
    /// At least one interpolated corner was located.
    pub matched: bool,
    pub corner_count: usize,
    pub marker_count: usize,
}

impl BoardFinding {
    pub fn from_observation(obs: &BoardObservation) -> Self {
        Self {
            matched: !obs.corners.is_empty(),
            corner_count: obs.corners.len(),
            marker_count: obs.markers.len(),
        }
    }
}

#[derive(Debug)]
pub struct BoardScan {
    pub annotated: Raster,
    pub finding: BoardFinding,
    pub observation: BoardObservation,
}

pub struct BoardLocator {
    engine: Box<dyn BoardEngine>,
    geometry: BoardGeometry,
}

impl BoardLocator {
    pub fn new(engine: Box<dyn BoardEngine>, geometry: BoardGeometry) -> Self {
        Self { engine, geometry }
    }

    pub fn geometry(&self) -> &BoardGeometry {
        &self.geometry
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Detect the board in `raster` and annotate a working copy.
    ///
    /// `raster` may already carry code outlines.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    pub fn locate(&self, raster: &Raster) -> Result<BoardScan, BoardError> {
        let descriptor = BoardDescriptor::new(&self.geometry)?;
        let observation = self.engine.detect(raster, &descriptor)?;
        let finding = BoardFinding::from_observation(&observation);

        let mut annotated = raster.clone();
        if !observation.corners.is_empty() {
            let points: Vec<_> = observation.corners.iter().map(|c| c.position).collect();
            draw_corner_marks(&mut annotated, &points, BOARD_CORNER_COLOR);
        }
        for marker in &observation.markers {
            if let Some(outline) = &marker.outline {
                draw_marker_outline(&mut annotated, outline, MARKER_OUTLINE_COLOR);
            }
        }

        if finding.matched {
            log::info!(
                "board detected: {} corner(s), {} marker(s)",
                finding.corner_count,
                finding.marker_count
            );
        } else if finding.marker_count > 0 {
            log::info!(
                "{} marker(s) found but no board corners interpolated",
                finding.marker_count
            );
        } else {
            log::info!("no board found");
        }
        Ok(BoardScan {
            annotated,
            finding,
            observation,
        })
    }
}
