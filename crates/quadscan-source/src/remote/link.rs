use std::sync::LazyLock;

use regex::Regex;

static FOLDER_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([-A-Za-z0-9_]{25,})").expect("valid regex"));
static ID_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([-A-Za-z0-9_]{25,})").expect("valid regex"));
static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9_]+$").expect("valid regex"));

/// Pull a folder id out of a share link.
///
/// Accepts `.../folders/<ID>` (including `/drive/u/N/folders/<ID>`) and
/// `?id=<ID>` / `&id=<ID>`. Ids are at least 25 characters of
/// `[-A-Za-z0-9_]`.
pub fn extract_folder_id(link: &str) -> Option<String> {
    let link = link.trim();
    FOLDER_PATH
        .captures(link)
        .or_else(|| ID_PARAM.captures(link))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// How the caller names a remote folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderRef {
    Id(String),
    Link(String),
}

impl FolderRef {
    /// Treat `input` as a link if it looks like a URL, else as a bare id.
    ///
    /// Bare ids are checked by [`FolderRef::resolve_id`], which accepts
    /// only `[-A-Za-z0-9_]` characters.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.contains('/') || input.contains('?') {
            FolderRef::Link(input.to_string())
        } else {
            FolderRef::Id(input.to_string())
        }
    }

    pub fn resolve_id(&self) -> Option<String> {
        match self {
            FolderRef::Id(id) if BARE_ID.is_match(id) => Some(id.clone()),
            FolderRef::Id(_) => None,
            FolderRef::Link(link) => extract_folder_id(link),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FolderRef::Id(s) | FolderRef::Link(s) => s,
        }
    }
}
