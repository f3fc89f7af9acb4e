//! JSON configuration for the scanner service.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quadscan_core::QUAD_EXPANSION;
use quadscan_detect::{BoardGeometry, DetectionPipeline};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("remote store setup failed: {0}")]
    Remote(String),
}

fn default_quad_expansion() -> f32 {
    QUAD_EXPANSION
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("drive_temp_downloads")
}

fn default_shared_root() -> PathBuf {
    PathBuf::from("shared_data")
}

fn default_processed_subdir() -> String {
    "proc_imgs".to_string()
}

fn default_jpeg_quality() -> u8 {
    85
}

/// Construction-time settings. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub board: BoardGeometry,
    #[serde(default = "default_quad_expansion")]
    pub quad_expansion: f32,
    /// Where remote downloads are staged.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_shared_root")]
    pub shared_root: PathBuf,
    /// Subfolder of the output root that receives saved images. Skipped by
    /// shared-directory scans.
    #[serde(default = "default_processed_subdir")]
    pub processed_subdir: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Transport timeout for remote store and token calls. `None` leaves
    /// requests unbounded.
    #[serde(default)]
    pub remote_timeout_secs: Option<u64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            board: BoardGeometry::default(),
            quad_expansion: default_quad_expansion(),
            scratch_dir: default_scratch_dir(),
            shared_root: default_shared_root(),
            processed_subdir: default_processed_subdir(),
            jpeg_quality: default_jpeg_quality(),
            remote_timeout_secs: None,
        }
    }
}

impl ScannerConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_secs.map(Duration::from_secs)
    }

    /// Pipeline with the default engines for this board and expansion.
    pub fn build_pipeline(&self) -> DetectionPipeline {
        DetectionPipeline::with_default_engines(self.board.clone(), self.quad_expansion)
    }

    /// Directory that receives saved processed images under `root`.
    pub fn processed_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.processed_subdir)
    }
}
