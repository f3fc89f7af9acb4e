//! Scratch files for remote downloads.
//!
//! A [`ScratchFile`] deletes its path when dropped, so error returns and
//! unwinding both clean up. Deleting a file that is already gone is a no-op.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tempfile::TempPath;

#[derive(Debug, Default)]
struct ScratchStats {
    created: AtomicUsize,
    removed: AtomicUsize,
}

/// Directory that holds in-flight downloads. Cheap to clone; clones share
/// counters.
#[derive(Clone, Debug)]
pub struct ScratchDir {
    root: PathBuf,
    stats: Arc<ScratchStats>,
}

impl ScratchDir {
    /// Use `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            stats: Arc::new(ScratchStats::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty scratch file named after `display_name`.
    ///
    /// `fallback_id` names the file when the display name sanitizes to
    /// nothing. The file is created exclusively under a random prefix, so
    /// equally named downloads never share a path, even across processes
    /// using the same root.
    pub fn create(&self, display_name: &str, fallback_id: &str) -> io::Result<(ScratchFile, File)> {
        let mut name = sanitize_filename(display_name);
        if name.is_empty() {
            name = format!("unnamed_remote_file_{}", sanitize_filename(fallback_id));
        }
        let (file, temp) = tempfile::Builder::new()
            .prefix("dl")
            .suffix(&format!("_{name}"))
            .tempfile_in(&self.root)?
            .into_parts();
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        log::debug!("created scratch file {}", temp.display());
        Ok((
            ScratchFile {
                path: temp.to_path_buf(),
                temp: Some(temp),
                stats: Arc::clone(&self.stats),
            },
            file,
        ))
    }

    /// Scratch files created so far.
    pub fn created(&self) -> usize {
        self.stats.created.load(Ordering::SeqCst)
    }

    /// Scratch files deleted so far.
    pub fn removed(&self) -> usize {
        self.stats.removed.load(Ordering::SeqCst)
    }
}

/// Guard for one scratch file.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    temp: Option<TempPath>,
    stats: Arc<ScratchStats>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. Equivalent to dropping the guard.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => {
                self.stats.removed.fetch_add(1, Ordering::SeqCst);
                log::debug!("removed scratch file {}", self.path.display());
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                log::error!(
                    "failed to remove scratch file {}: {err}",
                    self.path.display()
                );
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.remove();
    }
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

/// Reduce `name` to a flat, ASCII-only file name.
///
/// Path separators become spaces, whitespace runs become `_`, every other
/// character outside `[A-Za-z0-9_.-]` is dropped, and leading or trailing
/// dots and underscores are trimmed. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let flat = name.replace(['/', '\\'], " ");
    let joined = flat.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}
