use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a collection's images live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Uploaded or explicitly listed files on local disk.
    Local,
    /// A folder in the remote object store.
    Remote,
    /// A directory tree on the serving host.
    Shared,
}

impl CollectionMode {
    pub const ALL: [CollectionMode; 3] = [
        CollectionMode::Local,
        CollectionMode::Remote,
        CollectionMode::Shared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMode::Local => "local",
            CollectionMode::Remote => "remote",
            CollectionMode::Shared => "shared",
        }
    }
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown collection mode '{0}' (expected local, remote or shared)")]
pub struct ParseModeError(String);

impl FromStr for CollectionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(CollectionMode::Local),
            "remote" | "drive" => Ok(CollectionMode::Remote),
            "shared" | "server" => Ok(CollectionMode::Shared),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Immutable handle to one image of a collection.
///
/// `identifier` is a filesystem path for local and shared collections and a
/// store-native id for remote ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    mode: CollectionMode,
    identifier: String,
    display_name: String,
}

impl ImageReference {
    pub fn new(
        mode: CollectionMode,
        identifier: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            identifier: identifier.into(),
            display_name: display_name.into(),
        }
    }

    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
