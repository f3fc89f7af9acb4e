//! Per-user session state.
//!
//! A session holds at most one active collection, so installing a collection
//! of one mode leaves every other mode without a collection or cursor.
//! Verbs take `&mut SessionContext`; one session is never driven by two
//! requests at once.

use quadscan_source::{CollectionMode, Credential, ImageSource};

use crate::navigation::NavigationState;

pub(crate) struct ActiveCollection {
    pub(crate) source: Box<dyn ImageSource>,
    pub(crate) nav: NavigationState,
}

#[derive(Default)]
pub struct SessionContext {
    pub(crate) active: Option<ActiveCollection>,
    pub(crate) credential: Option<Credential>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that starts out signed in to the remote store.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            active: None,
            credential: Some(credential),
        }
    }

    pub fn active_mode(&self) -> Option<CollectionMode> {
        self.active.as_ref().map(|a| a.nav.mode())
    }

    /// Cursor of `mode`, `None` unless `mode` is the active one.
    pub fn cursor(&self, mode: CollectionMode) -> Option<NavigationState> {
        self.active
            .as_ref()
            .map(|a| a.nav)
            .filter(|nav| nav.mode() == mode)
    }

    /// Images held for `mode`; zero for inactive modes.
    pub fn collection_len(&self, mode: CollectionMode) -> usize {
        self.cursor(mode).map_or(0, |nav| nav.total())
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn is_signed_in(&self) -> bool {
        self.credential.is_some()
    }

    /// Make `source` the active collection, dropping whatever was active.
    pub(crate) fn install(&mut self, source: Box<dyn ImageSource>) -> NavigationState {
        let nav = NavigationState::new(source.mode(), source.len());
        if let Some(previous) = self.active_mode().filter(|m| *m != nav.mode()) {
            log::info!("switching from {previous} to {} collection", nav.mode());
        }
        self.active = Some(ActiveCollection { source, nav });
        nav
    }

    pub(crate) fn clear(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadscan_source::LocalSource;

    #[test]
    fn installing_a_collection_replaces_the_previous_one() {
        let mut session = SessionContext::new();
        let nav = session.install(Box::new(LocalSource::new(["a.png", "b.jpg", "c.bmp"])));
        assert_eq!(nav.index(), 0);
        assert_eq!(session.collection_len(CollectionMode::Local), 3);

        session.install(Box::new(LocalSource::new(Vec::<String>::new())));
        assert_eq!(session.cursor(CollectionMode::Local).map(|n| n.index()), Some(-1));
        assert_eq!(session.collection_len(CollectionMode::Local), 0);
        assert!(session.cursor(CollectionMode::Remote).is_none());

        session.clear();
        assert!(session.active_mode().is_none());
    }
}
