//! Image acquisition for quadscan.
//!
//! Three kinds of collection implement [`ImageSource`]:
//!
//! - [`LocalSource`]: an explicit list of files (uploads),
//! - [`SharedSource`]: a recursive scan of a directory on the host,
//! - [`RemoteSource`]: a folder in the remote object store, downloaded on
//!   demand into a [`ScratchDir`].
//!
//! Resolving an index yields a [`ResolvedImage`] whose backing scratch file,
//! if any, is deleted when it is dropped or released.
//!
//! ```no_run
//! use quadscan_source::{ImageSource, SharedSource};
//!
//! let shared = SharedSource::scan("shared_images", &["proc_imgs"])?;
//! let mut no_credential = None;
//! let image = shared.resolve(0, &mut no_credential)?;
//! let raster = image.load()?;
//! println!("{} is {}x{}", image.reference().display_name(), raster.width(), raster.height());
//! # Ok::<(), quadscan_source::SourceError>(())
//! ```

pub mod credential;
mod error;
mod local;
mod reference;
pub mod remote;
mod scratch;
pub mod secrets;

use std::path::Path;

use quadscan_core::{open_raster, Raster};

pub use credential::{
    AuthError, Credential, CredentialManager, HttpTokenEndpoint, TokenEndpoint, TokenGrant,
};
pub use error::SourceError;
pub use local::{has_extension, LocalSource, SharedSource, IMAGE_EXTENSIONS};
pub use reference::{CollectionMode, ImageReference, ParseModeError};
pub use remote::{DriveStore, FolderRef, RemoteAccess, RemoteError, RemoteSource, RemoteStore};
pub use scratch::{sanitize_filename, ScratchDir, ScratchFile};
pub use secrets::ClientSecrets;

/// An ordered collection of images.
pub trait ImageSource: Send + Sync {
    fn mode(&self) -> CollectionMode;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reference for `index`, without touching the backing storage.
    fn reference(&self, index: usize) -> Option<ImageReference>;

    /// Make the image at `index` available on the local filesystem.
    ///
    /// Remote sources read and may refresh `credential`; they empty it when
    /// re-authentication is required.
    fn resolve(
        &self,
        index: usize,
        credential: &mut Option<Credential>,
    ) -> Result<ResolvedImage, SourceError>;
}

#[derive(Debug)]
enum ImageHandle {
    Path(std::path::PathBuf),
    Scratch(ScratchFile),
}

/// A resolved image, readable at [`ResolvedImage::path`] for as long as the
/// value lives.
#[derive(Debug)]
pub struct ResolvedImage {
    reference: ImageReference,
    handle: ImageHandle,
}

impl ResolvedImage {
    pub fn from_path(reference: ImageReference, path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            reference,
            handle: ImageHandle::Path(path.into()),
        }
    }

    pub fn from_scratch(reference: ImageReference, scratch: ScratchFile) -> Self {
        Self {
            reference,
            handle: ImageHandle::Scratch(scratch),
        }
    }

    pub fn reference(&self) -> &ImageReference {
        &self.reference
    }

    pub fn path(&self) -> &Path {
        match &self.handle {
            ImageHandle::Path(p) => p,
            ImageHandle::Scratch(s) => s.path(),
        }
    }

    /// Whether the backing file is deleted on drop.
    pub fn is_scratch(&self) -> bool {
        matches!(self.handle, ImageHandle::Scratch(_))
    }

    /// Decode the image.
    pub fn load(&self) -> Result<Raster, SourceError> {
        open_raster(self.path()).map_err(|source| SourceError::Unreadable {
            display_name: self.reference.display_name().to_string(),
            source,
        })
    }

    /// Delete any scratch file now.
    pub fn release(self) {
        if let ImageHandle::Scratch(scratch) = self.handle {
            scratch.release();
        }
    }
}
