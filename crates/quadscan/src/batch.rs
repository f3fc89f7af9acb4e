//! Offline batch run of the code locator over a directory.

use std::fs;
use std::path::{Path, PathBuf};

use quadscan_core::{open_raster, write_raster};
use quadscan_detect::CodeLocator;
use quadscan_source::has_extension;
use serde::Serialize;

pub const BATCH_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("'{}' is not a readable directory: {source}", .dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub images_found: usize,
    pub processed: usize,
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}

/// Annotate every image directly inside `dir`.
///
/// Writes `<stem>_qr_all.<ext>` with all decoded codes outlined and
/// `<stem>_qr_<N>.<ext>` for each crop, numbered from 1. Images that fail to
/// load or write are listed in the report and do not stop the run.
pub fn process_directory(dir: &Path, locator: &CodeLocator) -> Result<BatchReport, BatchError> {
    let entries = fs::read_dir(dir).map_err(|source| BatchError::Directory {
        dir: dir.to_path_buf(),
        source,
    })?;
    let mut inputs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, &BATCH_EXTENSIONS))
        .collect();
    inputs.sort();

    let mut report = BatchReport {
        images_found: inputs.len(),
        ..BatchReport::default()
    };
    if inputs.is_empty() {
        log::warn!("no images with extensions {BATCH_EXTENSIONS:?} in {}", dir.display());
        return Ok(report);
    }

    for input in inputs {
        log::info!("processing {}", input.display());
        let raster = match open_raster(&input) {
            Ok(r) => r,
            Err(err) => {
                log::error!("{err}");
                report.failed.push(input);
                continue;
            }
        };
        let scan = match locator.locate(&raster) {
            Ok(scan) => scan,
            Err(err) => {
                log::error!("code detection failed on {}: {err}", input.display());
                report.failed.push(input);
                continue;
            }
        };

        let mut outputs = vec![(sibling(&input, "qr_all"), &*scan.annotated)];
        for (i, finding) in scan.findings.iter().enumerate() {
            outputs.push((sibling(&input, &format!("qr_{}", i + 1)), &finding.crop));
        }
        let mut ok = true;
        for (path, image) in outputs {
            match write_raster(image, &path) {
                Ok(()) => {
                    log::debug!("wrote {}", path.display());
                    report.written.push(path);
                }
                Err(err) => {
                    log::error!("cannot write {}: {err}", path.display());
                    ok = false;
                }
            }
        }
        if ok {
            report.processed += 1;
        } else {
            report.failed.push(input);
        }
    }
    log::info!(
        "batch done: {}/{} image(s) processed",
        report.processed,
        report.images_found
    );
    Ok(report)
}
