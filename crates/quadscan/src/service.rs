//! The verbs presentation layers call.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quadscan_core::encode_jpeg;
use quadscan_detect::{DetectionOutput, DetectionPipeline};
use quadscan_source::remote::RemoteFolder;
use quadscan_source::{
    CollectionMode, Credential, CredentialManager, DriveStore, FolderRef, HttpTokenEndpoint,
    ImageSource, LocalSource, RemoteAccess, ScratchDir, SharedSource, SourceError,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::{ConfigError, ScannerConfig};
use crate::navigation::{Direction, NavigationState};
use crate::response::{ErrorKind, ItemError, ItemResponse};
use crate::session::SessionContext;

/// Shared, immutable collaborators. One instance serves every session.
pub struct Scanner {
    config: ScannerConfig,
    pipeline: DetectionPipeline,
    remote: Option<RemoteAccess>,
}

/// Base name of `display_name` without directories or extension.
fn file_stem(display_name: &str) -> String {
    let base = display_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(display_name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

impl Scanner {
    pub fn new(config: ScannerConfig, pipeline: DetectionPipeline) -> Self {
        Self {
            config,
            pipeline,
            remote: None,
        }
    }

    /// Default engines plus the Drive store and HTTPS token endpoint.
    pub fn from_config(config: ScannerConfig) -> Result<Self, ConfigError> {
        let timeout = config.remote_timeout();
        let store = DriveStore::new(timeout).map_err(|e| ConfigError::Remote(e.to_string()))?;
        let endpoint =
            HttpTokenEndpoint::new(timeout).map_err(|e| ConfigError::Remote(e.to_string()))?;
        let scratch = ScratchDir::new(&config.scratch_dir)?;
        let access = RemoteAccess::new(
            Arc::new(store),
            CredentialManager::new(Arc::new(endpoint)),
            scratch,
        );
        let pipeline = config.build_pipeline();
        Ok(Self::new(config, pipeline).with_remote(access))
    }

    pub fn with_remote(mut self, access: RemoteAccess) -> Self {
        self.remote = Some(access);
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn remote(&self) -> Option<&RemoteAccess> {
        self.remote.as_ref()
    }

    fn remote_access(&self) -> Result<&RemoteAccess, ItemError> {
        self.remote.as_ref().ok_or_else(|| {
            ItemError::new(ErrorKind::InvalidRequest, "remote store is not configured")
        })
    }

    pub fn set_local_collection<I, P>(&self, session: &mut SessionContext, paths: I) -> NavigationState
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let source = LocalSource::new(paths);
        log::info!("local collection with {} image(s)", source.len());
        session.install(Box::new(source))
    }

    /// Scan `root` (default: the configured shared root), skipping the
    /// processed-output subfolder.
    pub fn set_shared_collection(
        &self,
        session: &mut SessionContext,
        root: Option<&Path>,
    ) -> Result<NavigationState, ItemError> {
        let root = root.unwrap_or(&self.config.shared_root);
        let source = SharedSource::scan(root, &[self.config.processed_subdir.as_str()])
            .map_err(|e| {
                log::error!("{e}");
                ItemError::from(e)
            })?;
        Ok(session.install(Box::new(source)))
    }

    /// Select a remote folder. A supplied credential replaces the session's.
    pub fn set_remote_collection(
        &self,
        session: &mut SessionContext,
        folder: &FolderRef,
        credential: Option<Credential>,
    ) -> Result<NavigationState, ItemError> {
        let access = self.remote_access()?;
        if let Some(credential) = credential {
            session.set_credential(credential);
        }
        let source = access
            .open_folder(folder, &mut session.credential)
            .map_err(ItemError::from)?;
        Ok(session.install(Box::new(source)))
    }

    pub fn remote_folders(&self, session: &mut SessionContext) -> Result<Vec<RemoteFolder>, ItemError> {
        self.remote_access()?
            .list_folders(&mut session.credential)
            .map_err(ItemError::from)
    }

    /// Acquire and process the image at `index`, then return it with its
    /// reference's display name. Any scratch copy is gone when this returns.
    fn process(
        &self,
        source: &dyn ImageSource,
        index: usize,
        credential: &mut Option<Credential>,
    ) -> Result<(String, DetectionOutput), SourceError> {
        let resolved = source.resolve(index, credential)?;
        let raster = resolved.load()?;
        let output = self.pipeline.run(raster);
        let name = resolved.reference().display_name().to_string();
        resolved.release();
        Ok((name, output))
    }

    /// Process item `index` of the `mode` collection. The cursor moves to
    /// `index` only when acquisition succeeds.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, session)))]
    pub fn get_item(&self, session: &mut SessionContext, mode: CollectionMode, index: i64) -> ItemResponse {
        let active_mode = session.active_mode();
        let SessionContext { active, credential } = session;
        let Some(active) = active.as_mut().filter(|a| a.nav.mode() == mode) else {
            return ItemResponse::failure(mode, None, ItemError::inactive_mode(mode, active_mode));
        };
        if !active.nav.contains(index) {
            log::warn!("{mode} index {index} rejected ({} image(s))", active.nav.total());
            return ItemResponse::failure(
                mode,
                Some(&active.nav),
                ItemError::invalid_index(index, active.nav.total()),
            );
        }

        match self.process(active.source.as_ref(), index as usize, credential) {
            Ok((name, output)) => {
                active.nav.select(index);
                log::info!(
                    "{mode} item {}/{} '{name}': {} code(s), board matched={}",
                    index + 1,
                    active.nav.total(),
                    output.codes.len(),
                    output.board.matched
                );
                ItemResponse::success(&active.nav, &name, output)
            }
            Err(err) => {
                log::error!("{mode} item {index} failed: {err}");
                let mut item_error = ItemError::from(&err);
                if item_error.display_name.is_none() {
                    if let Some(reference) = active.source.reference(index as usize) {
                        item_error = item_error.with_display_name(reference.display_name());
                    }
                }
                ItemResponse::failure(mode, Some(&active.nav), item_error)
            }
        }
    }

    /// Step the `mode` cursor and process the item there. At either end the
    /// current item is processed again.
    pub fn navigate(&self, session: &mut SessionContext, mode: CollectionMode, direction: Direction) -> ItemResponse {
        let Some(nav) = session.cursor(mode) else {
            let active = session.active_mode();
            return ItemResponse::failure(mode, None, ItemError::inactive_mode(mode, active));
        };
        if nav.is_empty() {
            return ItemResponse::failure(
                mode,
                Some(&nav),
                ItemError::new(ErrorKind::InvalidIndex, format!("{mode} collection is empty")),
            );
        }
        let target = nav.target(direction);
        log::debug!("navigate {direction} on {mode}: {} -> {target}", nav.index());
        self.get_item(session, mode, target)
    }

    /// Reprocess the current item and write the annotated result as
    /// `<root>/<processed_subdir>/<stem>_processed.jpg`. `root` defaults to
    /// the shared root.
    pub fn save_processed(&self, session: &mut SessionContext, root: Option<&Path>) -> Result<PathBuf, ItemError> {
        let SessionContext { active, credential } = session;
        let active = active
            .as_ref()
            .filter(|a| a.nav.index() >= 0)
            .ok_or_else(|| ItemError::new(ErrorKind::InvalidRequest, "no active image to save"))?;
        let (name, output) = self
            .process(active.source.as_ref(), active.nav.index() as usize, credential)
            .map_err(|e| {
                log::error!("save failed: {e}");
                ItemError::from(e)
            })?;

        let dir = self
            .config
            .processed_dir(root.unwrap_or(&self.config.shared_root));
        let path = dir.join(format!("{}_processed.jpg", file_stem(&name)));
        let io_error = |e: &dyn std::fmt::Display| {
            ItemError::new(ErrorKind::LocalIo, format!("cannot save {}: {e}", path.display()))
                .with_display_name(name.clone())
        };
        let bytes = encode_jpeg(output.final_image(), self.config.jpeg_quality).map_err(|e| io_error(&e))?;
        fs::create_dir_all(&dir).map_err(|e| io_error(&e))?;
        fs::write(&path, bytes).map_err(|e| io_error(&e))?;
        log::info!("saved processed '{name}' to {}", path.display());
        Ok(path)
    }

    /// Forget the credential and any remote or shared collection.
    pub fn sign_out(&self, session: &mut SessionContext) {
        session.credential = None;
        if matches!(
            session.active_mode(),
            Some(CollectionMode::Remote | CollectionMode::Shared)
        ) {
            session.clear();
        }
        log::info!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_drop_directories_and_extension() {
        assert_eq!(file_stem("sub/dir/shot.01.png"), "shot.01");
        assert_eq!(file_stem("plain"), "plain");
        assert_eq!(file_stem(r"win\path\a.jpg"), "a");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
