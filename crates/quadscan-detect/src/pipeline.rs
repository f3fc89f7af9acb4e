//! Code stage followed by board stage over one raster.
//!
//! Each stage yields a [`StageResult`]. A skipped stage forwards its input
//! image unchanged, so one broken detector never aborts the run.

use std::borrow::Cow;
use std::fmt;

use quadscan_core::Raster;
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::board::{default_board_engine, BoardFinding, BoardGeometry, BoardLocator, BoardObservation};
use crate::code::{CodeFinding, CodeLocator, RqrrCodeEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Codes,
    Board,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Codes => "codes",
            Stage::Board => "board",
        })
    }
}

/// Why a stage did not contribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageSkip {
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug)]
pub enum StageResult<T> {
    Ok(T),
    Skipped(StageSkip),
}

impl<T> StageResult<T> {
    pub fn capture<E: fmt::Display>(stage: Stage, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => StageResult::Ok(value),
            Err(err) => {
                log::warn!("{stage} stage skipped: {err}");
                StageResult::Skipped(StageSkip {
                    stage,
                    reason: err.to_string(),
                })
            }
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageResult::Skipped(_))
    }
}

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct DetectionOutput {
    pub original: Raster,
    /// `None` when no stage drew anything; see [`DetectionOutput::final_image`].
    pub annotated: Option<Raster>,
    pub board: BoardFinding,
    pub board_observation: Option<BoardObservation>,
    pub codes: Vec<CodeFinding>,
    pub skipped: Vec<StageSkip>,
}

impl DetectionOutput {
    /// The last stage's image, falling back to the untouched original.
    pub fn final_image(&self) -> &Raster {
        self.annotated.as_ref().unwrap_or(&self.original)
    }
}

pub struct DetectionPipeline {
    codes: CodeLocator,
    board: BoardLocator,
}

impl DetectionPipeline {
    pub fn new(codes: CodeLocator, board: BoardLocator) -> Self {
        Self { codes, board }
    }

    /// `rqrr` for codes and the build's default board engine.
    pub fn with_default_engines(geometry: BoardGeometry, expansion: f32) -> Self {
        Self::new(
            CodeLocator::new(Box::new(RqrrCodeEngine)).with_expansion(expansion),
            BoardLocator::new(default_board_engine(), geometry),
        )
    }

    pub fn code_locator(&self) -> &CodeLocator {
        &self.codes
    }

    pub fn board_locator(&self) -> &BoardLocator {
        &self.board
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    pub fn run(&self, raster: Raster) -> DetectionOutput {
        let mut skipped = Vec::new();

        let (mut annotated, codes) =
            match StageResult::capture(Stage::Codes, self.codes.locate(&raster)) {
                StageResult::Ok(scan) => {
                    let drawn = match scan.annotated {
                        Cow::Owned(img) => Some(img),
                        Cow::Borrowed(_) => None,
                    };
                    (drawn, scan.findings)
                }
                StageResult::Skipped(skip) => {
                    skipped.push(skip);
                    (None, Vec::new())
                }
            };

        let board_input = annotated.as_ref().unwrap_or(&raster);
        let (board, board_observation) =
            match StageResult::capture(Stage::Board, self.board.locate(board_input)) {
                StageResult::Ok(scan) => {
                    annotated = Some(scan.annotated);
                    (scan.finding, Some(scan.observation))
                }
                StageResult::Skipped(skip) => {
                    skipped.push(skip);
                    (BoardFinding::default(), None)
                }
            };

        log::debug!(
            "pipeline done: {} code(s), board matched={}, {} stage(s) skipped",
            codes.len(),
            board.matched,
            skipped.len()
        );
        DetectionOutput {
            original: raster,
            annotated,
            board,
            board_observation,
            codes,
            skipped,
        }
    }
}
