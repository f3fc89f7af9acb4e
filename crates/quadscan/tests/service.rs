use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{TimeDelta, Utc};
use image::{Rgb, RgbImage};
use nalgebra::Point2;
use quadscan::core::{payload, Quad, Raster};
use quadscan::detect::{
    BoardDescriptor, BoardEngine, BoardError, BoardGeometry, BoardLocator, BoardObservation,
    CandidateMeta, CodeCandidate, CodeEngine, CodeEngineError, CodeLocator, DetectionPipeline,
    Stage, UnavailableBoardEngine,
};
use quadscan::source::credential::{RefreshRequest, TokenGrant};
use quadscan::source::remote::{MediaStream, RemoteFile, RemoteFolder};
use quadscan::source::{
    AuthError, CredentialManager, RemoteAccess, RemoteError, RemoteStore, ScratchDir,
    TokenEndpoint,
};
use quadscan::{
    CollectionMode, Credential, Direction, ErrorKind, FolderRef, Scanner, ScannerConfig,
    SessionContext,
};

const FOLDER: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz";

// ---- fakes ---------------------------------------------------------------

struct OneCode(&'static str);

impl CodeEngine for OneCode {
    fn name(&self) -> &'static str {
        "one-code"
    }

    fn detect(&self, _: &Raster) -> Result<Vec<CodeCandidate>, CodeEngineError> {
        let quad: Quad = [
            Point2::new(4.0, 4.0),
            Point2::new(20.0, 4.0),
            Point2::new(20.0, 20.0),
            Point2::new(4.0, 20.0),
        ];
        Ok(vec![CodeCandidate {
            quad: Some(quad),
            meta: CandidateMeta::new(self.0.to_string()),
        }])
    }

    fn decode(&self, _: &Raster, c: &CodeCandidate) -> Option<String> {
        c.meta.downcast_ref::<String>().cloned()
    }
}

struct NoCodes;

impl CodeEngine for NoCodes {
    fn name(&self) -> &'static str {
        "no-codes"
    }

    fn detect(&self, _: &Raster) -> Result<Vec<CodeCandidate>, CodeEngineError> {
        Ok(Vec::new())
    }

    fn decode(&self, _: &Raster, _: &CodeCandidate) -> Option<String> {
        None
    }
}

struct FailingBoard;

impl BoardEngine for FailingBoard {
    fn name(&self) -> &'static str {
        "failing-board"
    }

    fn detect(&self, _: &Raster, _: &BoardDescriptor) -> Result<BoardObservation, BoardError> {
        Err(BoardError::Engine {
            engine: "failing-board",
            message: "corner refinement diverged".into(),
        })
    }
}

struct PanickingBoard;

impl BoardEngine for PanickingBoard {
    fn name(&self) -> &'static str {
        "panicking-board"
    }

    fn detect(&self, _: &Raster, _: &BoardDescriptor) -> Result<BoardObservation, BoardError> {
        panic!("board engine crashed");
    }
}

struct Store {
    files: Vec<RemoteFile>,
    /// Status returned by every download instead of the image.
    media_status: Option<u16>,
    tokens_seen: Mutex<Vec<String>>,
}

impl Store {
    fn with_images(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            files: names
                .iter()
                .enumerate()
                .map(|(i, n)| RemoteFile {
                    id: format!("id-{i}"),
                    name: n.to_string(),
                })
                .collect(),
            media_status: None,
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    fn rejecting(names: &[&str], status: u16) -> Arc<Self> {
        let mut store = Arc::into_inner(Self::with_images(names)).unwrap();
        store.media_status = Some(status);
        Arc::new(store)
    }
}

impl RemoteStore for Store {
    fn folder_name(&self, _: &str, _: &str) -> Result<String, RemoteError> {
        Ok("field shots".into())
    }

    fn list_folders(&self, _: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
        Ok(vec![RemoteFolder {
            id: FOLDER.into(),
            name: "field shots".into(),
        }])
    }

    fn list_images(&self, _: &str, _: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        Ok(self.files.clone())
    }

    fn open_media(&self, token: &str, _: &str) -> Result<MediaStream, RemoteError> {
        self.tokens_seen.lock().unwrap().push(token.to_string());
        if let Some(status) = self.media_status {
            return Err(RemoteError::Http {
                status,
                message: "insufficient permissions".into(),
            });
        }
        let bytes = png_bytes();
        Ok(MediaStream {
            len: Some(bytes.len() as u64),
            reader: Box::new(Cursor::new(bytes)),
        })
    }
}

struct Endpoint;

impl TokenEndpoint for Endpoint {
    fn refresh(&self, _: RefreshRequest<'_>) -> Result<TokenGrant, AuthError> {
        Ok(TokenGrant {
            access_token: "refreshed-token".into(),
            expires_in: Some(3599),
            refresh_token: None,
            scope: None,
            token_type: Some("Bearer".into()),
        })
    }
}

// ---- helpers -------------------------------------------------------------

fn photo() -> RgbImage {
    RgbImage::from_fn(48, 32, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 60]))
}

fn png_bytes() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    photo().write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn write_images(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|n| {
            let path = dir.join(n);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            photo().save(&path).unwrap();
            path
        })
        .collect()
}

fn credential(expiry: Option<chrono::DateTime<Utc>>) -> Credential {
    Credential {
        access_token: Some("stale-token".into()),
        refresh_token: Some("refresh".into()),
        token_endpoint: Some("https://oauth2.example/token".into()),
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        granted_scopes: vec!["https://www.googleapis.com/auth/drive.readonly".into()],
        expiry,
    }
}

struct Fixture {
    scanner: Scanner,
    scratch: ScratchDir,
    _tmp: tempfile::TempDir,
    root: PathBuf,
}

fn fixture(
    codes: Box<dyn CodeEngine>,
    board: Box<dyn BoardEngine>,
    store: Arc<Store>,
) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let config = ScannerConfig {
        scratch_dir: root.join("scratch"),
        shared_root: root.join("shared"),
        ..ScannerConfig::default()
    };
    let scratch = ScratchDir::new(&config.scratch_dir).unwrap();
    let pipeline = DetectionPipeline::new(
        CodeLocator::new(codes),
        BoardLocator::new(board, BoardGeometry::default()),
    );
    let access = RemoteAccess::new(
        store,
        CredentialManager::new(Arc::new(Endpoint)),
        scratch.clone(),
    );
    Fixture {
        scanner: Scanner::new(config, pipeline).with_remote(access),
        scratch,
        _tmp: tmp,
        root,
    }
}

fn scratch_is_empty(fx: &Fixture) -> bool {
    std::fs::read_dir(fx.scratch.root()).unwrap().next().is_none()
}

// ---- scenarios -----------------------------------------------------------

#[test]
fn remote_item_uses_one_scratch_file_even_when_board_stage_fails() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(FailingBoard),
        Store::with_images(&["a.png", "b.png", "c.png"]),
    );
    let mut session = SessionContext::with_credential(credential(None));
    let nav = fx
        .scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap();
    assert_eq!((nav.index(), nav.total()), (0, 3));

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Remote, 1);
    assert!(resp.is_ok(), "{:?}", resp.error);
    assert_eq!(resp.index, 1);
    assert_eq!(resp.display_name.as_deref(), Some("b.png"));
    assert!(!resp.board_matched);
    assert_eq!(resp.skipped.len(), 1);
    assert_eq!(resp.skipped[0].stage, Stage::Board);

    assert_eq!(fx.scratch.created(), 1);
    assert_eq!(fx.scratch.removed(), 1);
    assert!(scratch_is_empty(&fx));
}

#[test]
fn remote_scratch_file_is_removed_when_the_board_engine_panics() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(PanickingBoard),
        Store::with_images(&["a.png", "b.png", "c.png"]),
    );
    let mut session = SessionContext::with_credential(credential(None));
    fx.scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        fx.scanner.get_item(&mut session, CollectionMode::Remote, 1)
    }));
    assert!(outcome.is_err());
    assert_eq!(fx.scratch.created(), 1);
    assert_eq!(fx.scratch.removed(), 1);
    assert!(scratch_is_empty(&fx));
    // The failed call never committed its index.
    assert_eq!(session.cursor(CollectionMode::Remote).unwrap().index(), 0);
}

#[test]
fn expired_credential_is_refreshed_into_the_session() {
    let store = Store::with_images(&["a.png"]);
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        store.clone(),
    );
    let mut session = SessionContext::new();
    let expired = credential(Some(Utc::now() - TimeDelta::minutes(10)));
    fx.scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), Some(expired))
        .unwrap();

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Remote, 0);
    assert!(resp.is_ok(), "{:?}", resp.error);
    let stored = session.credential().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("refreshed-token"));
    assert!(!stored.is_expired());
    assert_eq!(store.tokens_seen.lock().unwrap().as_slice(), ["refreshed-token"]);
}

#[test]
fn rejected_download_requires_reauth_and_keeps_the_cursor() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::rejecting(&["a.png", "b.png"], 403),
    );
    let mut session = SessionContext::with_credential(credential(None));
    fx.scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap();

    let resp = fx.scanner.navigate(&mut session, CollectionMode::Remote, Direction::Next);
    let err = resp.error.unwrap();
    assert_eq!(err.kind, ErrorKind::ReauthRequired);
    assert!(err.reauth_required);
    assert_eq!(err.display_name.as_deref(), Some("b.png"));
    assert!(!session.is_signed_in());
    assert_eq!(resp.index, 0);
    assert_eq!(session.collection_len(CollectionMode::Remote), 2);
    assert_eq!(fx.scratch.created(), fx.scratch.removed());
}

#[test]
fn switching_modes_clears_the_other_collections() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&["r.png"]),
    );
    let paths = write_images(&fx.root.join("uploads"), &["1.png", "2.png", "3.png"]);
    let mut session = SessionContext::with_credential(credential(None));

    fx.scanner.set_local_collection(&mut session, paths);
    assert_eq!(session.collection_len(CollectionMode::Local), 3);

    fx.scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap();
    assert_eq!(session.active_mode(), Some(CollectionMode::Remote));
    assert_eq!(session.collection_len(CollectionMode::Local), 0);
    assert!(session.cursor(CollectionMode::Local).is_none());

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Local, 0);
    assert_eq!(resp.error.unwrap().kind, ErrorKind::InactiveMode);
    assert_eq!(fx.scratch.created(), 0);
}

#[test]
fn navigation_is_clamped_and_reports_neighbours() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&[]),
    );
    let paths = write_images(&fx.root.join("uploads"), &["1.png", "2.png", "3.png"]);
    let mut session = SessionContext::new();
    fx.scanner.set_local_collection(&mut session, paths);

    let resp = fx.scanner.navigate(&mut session, CollectionMode::Local, Direction::Prev);
    assert_eq!((resp.index, resp.has_prev, resp.has_next), (0, false, true));

    for expected in [1, 2, 2] {
        let resp = fx.scanner.navigate(&mut session, CollectionMode::Local, Direction::Next);
        assert!(resp.is_ok());
        assert_eq!(resp.index, expected);
    }
    let resp = fx.scanner.get_item(&mut session, CollectionMode::Local, 2);
    assert_eq!(resp.display_name.as_deref(), Some("3.png"));
    assert!(!resp.has_next && resp.has_prev);

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Local, 3);
    assert_eq!(resp.error.unwrap().kind, ErrorKind::InvalidIndex);
    assert_eq!(resp.index, 2);
}

#[test]
fn missing_local_file_is_reported_by_name_without_moving() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&[]),
    );
    let mut paths = write_images(&fx.root.join("uploads"), &["1.png"]);
    paths.push(fx.root.join("uploads/gone.png"));
    let mut session = SessionContext::new();
    fx.scanner.set_local_collection(&mut session, paths);

    let resp = fx.scanner.navigate(&mut session, CollectionMode::Local, Direction::Next);
    let err = resp.error.unwrap();
    assert_eq!(err.kind, ErrorKind::LocalIo);
    assert_eq!(err.display_name.as_deref(), Some("gone.png"));
    assert!(err.message.contains("gone.png"));
    assert_eq!(session.cursor(CollectionMode::Local).unwrap().index(), 0);
}

#[test]
fn image_without_codes_comes_back_unmodified() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&[]),
    );
    let paths = write_images(&fx.root.join("uploads"), &["plain.png"]);
    let mut session = SessionContext::new();
    fx.scanner.set_local_collection(&mut session, paths);

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Local, 0);
    assert!(resp.codes.is_empty());
    let images = resp.images.unwrap();
    assert_eq!(images.annotated, images.original);
    assert_eq!(images.original, photo());
    assert!(images.crops.is_empty());
}

#[test]
fn decoded_codes_carry_text_record_and_crop() {
    let record = serde_json::json!({"sample": "A-17", "weight_g": 412});
    let text: &'static str = Box::leak(payload::encode(&record).unwrap().into_boxed_str());
    let fx = fixture(
        Box::new(OneCode(text)),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&[]),
    );
    let paths = write_images(&fx.root.join("uploads"), &["label.png"]);
    let mut session = SessionContext::new();
    fx.scanner.set_local_collection(&mut session, paths);

    let resp = fx.scanner.get_item(&mut session, CollectionMode::Local, 0);
    assert_eq!(resp.codes.len(), 1);
    assert_eq!(resp.codes[0].text.as_deref(), Some(text));
    assert_eq!(resp.codes[0].record.as_ref(), Some(&record));
    let images = resp.images.unwrap();
    assert_ne!(images.annotated, images.original);
    assert_eq!(images.crops.len(), 1);
}

#[test]
fn saved_images_land_in_the_processed_folder_and_are_not_rescanned() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&[]),
    );
    let shared = fx.scanner.config().shared_root.clone();
    write_images(&shared, &["b.png", "nested/a.jpg"]);
    let mut session = SessionContext::new();

    let err = fx.scanner.save_processed(&mut session, None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRequest);

    let nav = fx.scanner.set_shared_collection(&mut session, None).unwrap();
    assert_eq!(nav.total(), 2);
    let resp = fx.scanner.get_item(&mut session, CollectionMode::Shared, 1);
    assert_eq!(resp.display_name.as_deref(), Some("nested/a.jpg"));

    let saved = fx.scanner.save_processed(&mut session, None).unwrap();
    assert_eq!(saved, shared.join("proc_imgs").join("a_processed.jpg"));
    assert!(saved.is_file());

    let nav = fx.scanner.set_shared_collection(&mut session, None).unwrap();
    assert_eq!(nav.total(), 2);
}

#[test]
fn sign_out_drops_remote_state_but_keeps_uploads() {
    let fx = fixture(
        Box::new(NoCodes),
        Box::new(UnavailableBoardEngine::default()),
        Store::with_images(&["r.png"]),
    );
    let mut session = SessionContext::with_credential(credential(None));
    assert_eq!(fx.scanner.remote_folders(&mut session).unwrap().len(), 1);
    fx.scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap();

    fx.scanner.sign_out(&mut session);
    assert!(!session.is_signed_in());
    assert!(session.active_mode().is_none());

    let paths = write_images(&fx.root.join("uploads"), &["1.png"]);
    fx.scanner.set_local_collection(&mut session, paths);
    fx.scanner.sign_out(&mut session);
    assert_eq!(session.collection_len(CollectionMode::Local), 1);

    let err = fx
        .scanner
        .set_remote_collection(&mut session, &FolderRef::Id(FOLDER.into()), None)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ReauthRequired);
}
