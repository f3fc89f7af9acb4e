//! Remote object store access.
//!
//! [`RemoteStore`] is the transport seam; [`DriveStore`] talks to the Drive v3
//! REST API. [`RemoteSource`] downloads one image per resolve into a scratch
//! file that is deleted when the returned [`ResolvedImage`] is dropped.

mod drive;
mod link;

use std::io::{self, Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::credential::{Credential, CredentialManager};
use crate::error::SourceError;
use crate::reference::{CollectionMode, ImageReference};
use crate::scratch::ScratchDir;
use crate::{ImageSource, ResolvedImage};

pub use drive::{DriveStore, DRIVE_API_BASE};
pub use link::{extract_folder_id, FolderRef};

/// Bytes moved per read during a download.
pub const DOWNLOAD_CHUNK: usize = 1 << 20;

#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("download interrupted: {0}")]
    Interrupted(#[source] io::Error),
}

impl RemoteError {
    /// `Some(status)` for 401/403 responses.
    pub fn auth_status(&self) -> Option<u16> {
        match self {
            RemoteError::Http { status, .. } if *status == 401 || *status == 403 => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

/// An open download.
pub struct MediaStream {
    pub reader: Box<dyn Read + Send>,
    /// Expected byte count when the server announces one.
    pub len: Option<u64>,
}

pub trait RemoteStore: Send + Sync {
    fn folder_name(&self, token: &str, folder_id: &str) -> Result<String, RemoteError>;

    /// Folders visible to the token owner, excluding trashed ones.
    fn list_folders(&self, token: &str) -> Result<Vec<RemoteFolder>, RemoteError>;

    /// Non-trashed jpeg/png/bmp/gif files directly inside `folder_id`.
    fn list_images(&self, token: &str, folder_id: &str) -> Result<Vec<RemoteFile>, RemoteError>;

    fn open_media(&self, token: &str, file_id: &str) -> Result<MediaStream, RemoteError>;
}

/// Collaborators shared by every remote operation.
#[derive(Clone)]
pub struct RemoteAccess {
    pub store: Arc<dyn RemoteStore>,
    pub credentials: CredentialManager,
    pub scratch: ScratchDir,
}

impl RemoteAccess {
    pub fn new(store: Arc<dyn RemoteStore>, credentials: CredentialManager, scratch: ScratchDir) -> Self {
        Self {
            store,
            credentials,
            scratch,
        }
    }

    fn token(&self, slot: &mut Option<Credential>, subject: &str) -> Result<String, SourceError> {
        self.credentials
            .ensure_fresh(slot)
            .map_err(|source| SourceError::Auth {
                display_name: subject.to_string(),
                source,
            })
    }

    /// Map a store error, invalidating the credential on 401/403.
    fn store_error(&self, slot: &mut Option<Credential>, err: RemoteError, subject: &str) -> SourceError {
        match err.auth_status() {
            Some(status) => SourceError::Auth {
                display_name: subject.to_string(),
                source: self.credentials.invalidate(slot, status),
            },
            None => {
                log::error!("remote store error for '{subject}': {err}");
                SourceError::Remote {
                    display_name: subject.to_string(),
                    source: err,
                }
            }
        }
    }

    pub fn list_folders(&self, slot: &mut Option<Credential>) -> Result<Vec<RemoteFolder>, SourceError> {
        let token = self.token(slot, "folder list")?;
        self.store
            .list_folders(&token)
            .map_err(|e| self.store_error(slot, e, "folder list"))
    }

    /// Resolve `folder`, fetch its name and image list, and build a source.
    pub fn open_folder(
        &self,
        folder: &FolderRef,
        slot: &mut Option<Credential>,
    ) -> Result<RemoteSource, SourceError> {
        let id = folder
            .resolve_id()
            .ok_or_else(|| SourceError::InvalidFolder(folder.as_str().to_string()))?;
        let token = self.token(slot, &id)?;
        let name = self
            .store
            .folder_name(&token, &id)
            .map_err(|e| self.store_error(slot, e, &id))?;
        let files = self
            .store
            .list_images(&token, &id)
            .map_err(|e| self.store_error(slot, e, &name))?;
        log::info!("remote folder '{name}' holds {} image(s)", files.len());
        Ok(RemoteSource {
            folder: RemoteFolder { id, name },
            files,
            access: self.clone(),
        })
    }
}

/// Images of one remote folder, listed once at selection time.
pub struct RemoteSource {
    folder: RemoteFolder,
    files: Vec<RemoteFile>,
    access: RemoteAccess,
}

impl RemoteSource {
    pub fn folder(&self) -> &RemoteFolder {
        &self.folder
    }

    pub fn files(&self) -> &[RemoteFile] {
        &self.files
    }
}

/// Copy `reader` into `out` in fixed-size chunks, keeping read and write
/// failures apart.
fn transfer(
    reader: &mut dyn Read,
    out: &mut dyn Write,
    expected: Option<u64>,
    name: &str,
) -> Result<u64, TransferError> {
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    let mut received: u64 = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::Read(e)),
        };
        out.write_all(&buf[..n]).map_err(TransferError::Write)?;
        received += n as u64;
        if let Some(total) = expected.filter(|t| *t > 0) {
            log::debug!("download '{name}' {}%", received.saturating_mul(100) / total);
        }
    }
    out.flush().map_err(TransferError::Write)?;
    Ok(received)
}

enum TransferError {
    Read(io::Error),
    Write(io::Error),
}

impl ImageSource for RemoteSource {
    fn mode(&self) -> CollectionMode {
        CollectionMode::Remote
    }

    fn len(&self) -> usize {
        self.files.len()
    }

    fn reference(&self, index: usize) -> Option<ImageReference> {
        self.files
            .get(index)
            .map(|f| ImageReference::new(CollectionMode::Remote, f.id.clone(), f.name.clone()))
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, credential), fields(folder = %self.folder.name))
    )]
    fn resolve(
        &self,
        index: usize,
        credential: &mut Option<Credential>,
    ) -> Result<ResolvedImage, SourceError> {
        let (file, reference) = match (self.files.get(index), self.reference(index)) {
            (Some(f), Some(r)) => (f, r),
            _ => {
                return Err(SourceError::InvalidIndex {
                    index: index as i64,
                    total: self.files.len(),
                })
            }
        };
        let name = file.name.as_str();
        let token = self.access.token(credential, name)?;

        let (scratch, mut out) =
            self.access
                .scratch
                .create(name, &file.id)
                .map_err(|source| SourceError::Scratch {
                    display_name: name.to_string(),
                    source,
                })?;
        // From here on `scratch` deletes the file on every exit path.
        let mut media = self
            .access
            .store
            .open_media(&token, &file.id)
            .map_err(|e| self.access.store_error(credential, e, name))?;
        log::info!("downloading '{name}' to {}", scratch.path().display());

        let received = match transfer(media.reader.as_mut(), &mut out, media.len, name) {
            Ok(n) => n,
            Err(TransferError::Read(e)) => {
                return Err(self
                    .access
                    .store_error(credential, RemoteError::Interrupted(e), name))
            }
            Err(TransferError::Write(source)) => {
                return Err(SourceError::Scratch {
                    display_name: name.to_string(),
                    source,
                })
            }
        };
        drop(out);
        if let Some(expected) = media.len {
            if received != expected {
                return Err(SourceError::Incomplete {
                    display_name: name.to_string(),
                    received,
                    expected,
                });
            }
        }
        log::debug!("downloaded '{name}' ({received} bytes)");
        Ok(ResolvedImage::from_scratch(reference, scratch))
    }
}
