//! High-level facade crate for the `quadscan-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core, detector and source crates
//! - [`Scanner`]: the `get_item` / `navigate` verbs over a per-user
//!   [`SessionContext`], plus collection selection, saving and sign-out
//! - [`JsonPresenter`], the reference presentation adapter
//! - [`batch::process_directory`] for offline code extraction
//!
//! ## Quickstart
//!
//! ```no_run
//! use quadscan::{CollectionMode, Direction, JsonPresenter, Presenter, Scanner, ScannerConfig, SessionContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScannerConfig::default();
//! let scanner = Scanner::new(config.clone(), config.build_pipeline());
//! let mut session = SessionContext::new();
//!
//! scanner.set_local_collection(&mut session, ["board.png", "labels.jpg"]);
//! let first = scanner.get_item(&mut session, CollectionMode::Local, 0);
//! let second = scanner.navigate(&mut session, CollectionMode::Local, Direction::Next);
//! println!("{}", JsonPresenter::metadata_only().render(&second)?);
//! # let _ = first;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `quadscan::core`: rasters, quad geometry, drawing, payload codec, logger.
//! - `quadscan::detect`: code and board locators and the detection pipeline.
//! - `quadscan::source`: local, shared and remote image sources, credentials.

pub use quadscan_core as core;
pub use quadscan_detect as detect;
pub use quadscan_source as source;

pub mod batch;
mod config;
mod navigation;
mod render;
mod response;
mod service;
mod session;

pub use config::{ConfigError, ScannerConfig};
pub use navigation::{Direction, NavigationState, ParseDirectionError};
pub use render::{JsonPresenter, Presenter, RenderError};
pub use response::{CodeSummary, ErrorKind, ItemError, ItemImages, ItemResponse};
pub use service::Scanner;
pub use session::SessionContext;

pub use quadscan_source::{CollectionMode, Credential, FolderRef};
