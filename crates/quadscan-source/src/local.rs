//! Collections backed by the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::credential::Credential;
use crate::error::SourceError;
use crate::reference::{CollectionMode, ImageReference};
use crate::{ImageSource, ResolvedImage};

/// Extensions accepted for local uploads and shared-directory scans.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Case-insensitive check of `path`'s extension against `allowed`.
pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| allowed.contains(&e.as_str()))
}

fn stat(path: &Path, display_name: &str) -> Result<(), SourceError> {
    let meta = fs::metadata(path).map_err(|source| SourceError::LocalIo {
        display_name: display_name.to_string(),
        source,
    })?;
    if meta.is_file() {
        Ok(())
    } else {
        Err(SourceError::LocalIo {
            display_name: display_name.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        })
    }
}

fn out_of_range(index: usize, total: usize) -> SourceError {
    SourceError::InvalidIndex {
        index: index as i64,
        total,
    }
}

/// Explicit list of files, e.g. uploads saved by the presentation layer.
#[derive(Clone, Debug, Default)]
pub struct LocalSource {
    paths: Vec<PathBuf>,
}

impl LocalSource {
    /// Keep image files from `paths`, in the given order.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut kept = Vec::new();
        for p in paths.into_iter().map(Into::into) {
            if has_extension(&p, &IMAGE_EXTENSIONS) {
                kept.push(p);
            } else {
                log::info!("skipping non-image file {}", p.display());
            }
        }
        Self { paths: kept }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn display_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

impl ImageSource for LocalSource {
    fn mode(&self) -> CollectionMode {
        CollectionMode::Local
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn reference(&self, index: usize) -> Option<ImageReference> {
        self.paths.get(index).map(|p| {
            ImageReference::new(
                CollectionMode::Local,
                p.display().to_string(),
                Self::display_name(p),
            )
        })
    }

    fn resolve(
        &self,
        index: usize,
        _credential: &mut Option<Credential>,
    ) -> Result<ResolvedImage, SourceError> {
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| out_of_range(index, self.len()))?;
        let reference = self
            .reference(index)
            .ok_or_else(|| out_of_range(index, self.len()))?;
        stat(path, reference.display_name())?;
        Ok(ResolvedImage::from_path(reference, path.clone()))
    }
}

/// Recursive scan of a directory on the serving host.
#[derive(Clone, Debug)]
pub struct SharedSource {
    root: PathBuf,
    /// Paths relative to `root`, sorted.
    files: Vec<PathBuf>,
}

impl SharedSource {
    /// Walk `root` for images. Directories named in `exclude` (relative to
    /// `root`, first level only) are not descended into.
    pub fn scan(root: impl Into<PathBuf>, exclude: &[&str]) -> Result<Self, SourceError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::SharedRoot {
                root,
                message: "not a directory".to_string(),
            });
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() == 1
                    && e.file_type().is_dir()
                    && exclude.iter().any(|x| e.file_name() == *x))
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), &IMAGE_EXTENSIONS) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&root) {
                files.push(rel.to_path_buf());
            }
        }
        files.sort();
        log::info!("found {} image(s) under {}", files.len(), root.display());
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl ImageSource for SharedSource {
    fn mode(&self) -> CollectionMode {
        CollectionMode::Shared
    }

    fn len(&self) -> usize {
        self.files.len()
    }

    fn reference(&self, index: usize) -> Option<ImageReference> {
        self.files.get(index).map(|rel| {
            ImageReference::new(
                CollectionMode::Shared,
                self.root.join(rel).display().to_string(),
                rel.to_string_lossy().into_owned(),
            )
        })
    }

    fn resolve(
        &self,
        index: usize,
        _credential: &mut Option<Credential>,
    ) -> Result<ResolvedImage, SourceError> {
        let rel = self
            .files
            .get(index)
            .ok_or_else(|| out_of_range(index, self.len()))?;
        let reference = self
            .reference(index)
            .ok_or_else(|| out_of_range(index, self.len()))?;
        let path = self.root.join(rel);
        stat(&path, reference.display_name())?;
        Ok(ResolvedImage::from_path(reference, path))
    }
}
