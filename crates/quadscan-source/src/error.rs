use std::path::PathBuf;

use crate::credential::AuthError;
use crate::remote::RemoteError;

/// Acquisition failure. Every variant names the image or location involved.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("index {index} is out of range for {total} image(s)")]
    InvalidIndex { index: i64, total: usize },

    #[error("cannot read '{display_name}': {source}")]
    LocalIo {
        display_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot scan shared directory {}: {message}", .root.display())]
    SharedRoot { root: PathBuf, message: String },

    #[error("'{display_name}' is not a readable image: {source}")]
    Unreadable {
        display_name: String,
        #[source]
        source: quadscan_core::RasterError,
    },

    #[error("remote error for '{display_name}': {source}")]
    Remote {
        display_name: String,
        #[source]
        source: RemoteError,
    },

    #[error("re-authentication required for '{display_name}': {source}")]
    Auth {
        display_name: String,
        #[source]
        source: AuthError,
    },

    #[error("incomplete download of '{display_name}': received {received} of {expected} bytes")]
    Incomplete {
        display_name: String,
        received: u64,
        expected: u64,
    },

    #[error("scratch file for '{display_name}' failed: {source}")]
    Scratch {
        display_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a recognised folder link or id")]
    InvalidFolder(String),
}

impl SourceError {
    /// The caller must send the user through the consent flow again.
    pub fn reauth_required(&self) -> bool {
        matches!(self, SourceError::Auth { .. })
    }

    /// Display name of the image or folder the error is about, if any.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            SourceError::LocalIo { display_name, .. }
            | SourceError::Unreadable { display_name, .. }
            | SourceError::Remote { display_name, .. }
            | SourceError::Auth { display_name, .. }
            | SourceError::Incomplete { display_name, .. }
            | SourceError::Scratch { display_name, .. } => Some(display_name),
            SourceError::InvalidFolder(link) => Some(link),
            SourceError::InvalidIndex { .. } | SourceError::SharedRoot { .. } => None,
        }
    }
}
