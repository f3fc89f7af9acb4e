//! Detectors and the annotation pipeline.
//!
//! - [`code`]: quadrilateral code locator with an injectable [`CodeEngine`].
//! - [`board`]: calibration-board locator with an injectable [`BoardEngine`].
//! - [`pipeline`]: runs codes then board, chaining annotations.
//!
//! Engines are traits so the pipeline can be exercised with deterministic
//! fakes. `rqrr` is the default code engine; the ChArUco engine from
//! `calib-targets` sits behind the default `charuco` feature.

pub mod board;
pub mod code;
pub mod pipeline;

pub use board::{
    default_board_engine, BoardCorner, BoardDescriptor, BoardEngine, BoardError, BoardFinding,
    BoardGeometry, BoardLocator, BoardObservation, BoardScan, MarkerDictionary,
    MarkerObservation, UnavailableBoardEngine,
};
pub use code::{
    CandidateMeta, CodeCandidate, CodeEngine, CodeEngineError, CodeFinding, CodeLocator,
    CodeScan, RqrrCodeEngine,
};
pub use pipeline::{DetectionOutput, DetectionPipeline, Stage, StageResult, StageSkip};

#[cfg(feature = "charuco")]
pub use board::CalibTargetsBoardEngine;
