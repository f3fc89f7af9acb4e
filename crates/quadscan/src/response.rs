//! Verb results handed to presentation adapters.

use std::fmt;

use quadscan_core::Raster;
use quadscan_detect::{BoardFinding, DetectionOutput, StageSkip};
use quadscan_source::{CollectionMode, SourceError};
use serde::Serialize;

use crate::navigation::NavigationState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIndex,
    InactiveMode,
    InvalidRequest,
    LocalIo,
    UnreadableImage,
    Remote,
    ReauthRequired,
}

/// Structured, source-attributed failure of one verb call.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
    pub display_name: Option<String>,
    pub reauth_required: bool,
}

impl ItemError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            display_name: None,
            reauth_required: kind == ErrorKind::ReauthRequired,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn inactive_mode(requested: CollectionMode, active: Option<CollectionMode>) -> Self {
        let message = match active {
            Some(active) => format!("{requested} collection is not active (active: {active})"),
            None => format!("{requested} collection is not active (no collection selected)"),
        };
        Self::new(ErrorKind::InactiveMode, message)
    }

    pub fn invalid_index(index: i64, total: usize) -> Self {
        Self::new(
            ErrorKind::InvalidIndex,
            format!("index {index} is out of range for {total} image(s)"),
        )
    }
}

impl From<&SourceError> for ItemError {
    fn from(err: &SourceError) -> Self {
        let kind = match err {
            SourceError::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            SourceError::LocalIo { .. } | SourceError::SharedRoot { .. } => ErrorKind::LocalIo,
            SourceError::Unreadable { .. } => ErrorKind::UnreadableImage,
            SourceError::Auth { .. } => ErrorKind::ReauthRequired,
            SourceError::InvalidFolder(_) => ErrorKind::InvalidRequest,
            SourceError::Remote { .. }
            | SourceError::Incomplete { .. }
            | SourceError::Scratch { .. } => ErrorKind::Remote,
        };
        Self {
            kind,
            message: err.to_string(),
            display_name: err.display_name().map(str::to_owned),
            reauth_required: err.reauth_required(),
        }
    }
}

impl From<SourceError> for ItemError {
    fn from(err: SourceError) -> Self {
        Self::from(&err)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CodeSummary {
    pub text: Option<String>,
    pub record: Option<serde_json::Value>,
}

/// Rasters of a processed item. Not serialized; adapters encode them.
#[derive(Clone)]
pub struct ItemImages {
    pub original: Raster,
    pub annotated: Raster,
    pub crops: Vec<Raster>,
}

impl fmt::Debug for ItemImages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemImages")
            .field("original", &self.original.dimensions())
            .field("annotated", &self.annotated.dimensions())
            .field("crops", &self.crops.len())
            .finish()
    }
}

/// Result of `get_item` and `navigate`.
#[derive(Clone, Debug, Serialize)]
pub struct ItemResponse {
    pub mode: CollectionMode,
    pub index: i64,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub display_name: Option<String>,
    pub board_matched: bool,
    pub board: Option<BoardFinding>,
    pub codes: Vec<CodeSummary>,
    pub skipped: Vec<StageSkip>,
    pub error: Option<ItemError>,
    #[serde(skip)]
    pub images: Option<ItemImages>,
}

impl ItemResponse {
    fn bare(mode: CollectionMode, nav: Option<&NavigationState>) -> Self {
        Self {
            mode,
            index: nav.map_or(-1, |n| n.index()),
            total: nav.map_or(0, |n| n.total()),
            has_next: nav.is_some_and(|n| n.has_next()),
            has_prev: nav.is_some_and(|n| n.has_prev()),
            display_name: None,
            board_matched: false,
            board: None,
            codes: Vec::new(),
            skipped: Vec::new(),
            error: None,
            images: None,
        }
    }

    /// Failed call. `nav` is the unchanged cursor, if any.
    pub fn failure(mode: CollectionMode, nav: Option<&NavigationState>, error: ItemError) -> Self {
        let mut response = Self::bare(mode, nav);
        response.display_name = error.display_name.clone();
        response.error = Some(error);
        response
    }

    /// Processed item at the cursor position.
    pub fn success(nav: &NavigationState, display_name: &str, output: DetectionOutput) -> Self {
        let mut response = Self::bare(nav.mode(), Some(nav));
        response.display_name = Some(display_name.to_string());
        response.board_matched = output.board.matched;
        response.board = Some(output.board);
        response.codes = output
            .codes
            .iter()
            .map(|c| CodeSummary {
                text: c.text.clone(),
                record: c.record.clone(),
            })
            .collect();
        response.skipped = output.skipped.clone();
        let crops = output.codes.into_iter().map(|c| c.crop).collect();
        let annotated = output.annotated.unwrap_or_else(|| output.original.clone());
        response.images = Some(ItemImages {
            original: output.original,
            annotated,
            crops,
        });
        response
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadscan_source::AuthError;

    #[test]
    fn auth_failures_map_to_reauth() {
        let err = SourceError::Auth {
            display_name: "scan.png".into(),
            source: AuthError::Rejected { status: 401 },
        };
        let item = ItemError::from(&err);
        assert_eq!(item.kind, ErrorKind::ReauthRequired);
        assert!(item.reauth_required);
        assert_eq!(item.display_name.as_deref(), Some("scan.png"));
        assert!(item.message.contains("scan.png"));
    }

    #[test]
    fn error_kinds_serialize_snake_case() {
        let json = serde_json::to_value(ItemError::inactive_mode(CollectionMode::Remote, None)).unwrap();
        assert_eq!(json["kind"], "inactive_mode");
        assert_eq!(json["reauth_required"], false);
    }

    #[test]
    fn failure_keeps_cursor_metadata() {
        let nav = NavigationState::new(CollectionMode::Shared, 4);
        let resp = ItemResponse::failure(
            CollectionMode::Shared,
            Some(&nav),
            ItemError::invalid_index(9, 4),
        );
        assert_eq!((resp.index, resp.total), (0, 4));
        assert!(resp.has_next && !resp.has_prev);
        assert!(!resp.is_ok());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("images").is_none());
        assert_eq!(json["error"]["kind"], "invalid_index");
    }
}
