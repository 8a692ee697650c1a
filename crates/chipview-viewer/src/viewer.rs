//! The shared viewer the host UI opens and closes

use parking_lot::{const_mutex, Mutex};

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::session::{SessionContext, ViewerSession};
use crate::surface::Container;

static GLOBAL: ChipViewer = ChipViewer::new();

/// Holds at most one open session
pub struct ChipViewer {
    current: Mutex<Option<ViewerSession>>,
}

impl ChipViewer {
    pub const fn new() -> Self {
        Self {
            current: const_mutex(None),
        }
    }

    /// The process-wide viewer
    pub fn global() -> &'static ChipViewer {
        &GLOBAL
    }

    /// Open a fresh session in `container`, disposing any open one first
    pub fn init(
        &self,
        container: &dyn Container,
        ctx: &SessionContext,
        config: ViewerConfig,
    ) -> Result<ViewerSession, ViewerError> {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.dispose();
        }

        let session = ViewerSession::new(config);
        session.init(container, ctx)?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Close the open session, if any
    pub fn dispose(&self) {
        if let Some(session) = self.current.lock().take() {
            session.dispose();
        }
    }

    pub fn current(&self) -> Option<ViewerSession> {
        self.current.lock().clone()
    }
}

impl Default for ChipViewer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HostEvents;
    use crate::scene::tests::chip_model;
    use crate::session::SessionState;
    use crate::surface::HeadlessContainer;
    use chipview_assets::ModelCache;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reopen_cycle_reuses_cached_model() {
        let cache = Arc::new(ModelCache::new());
        let model = cache.notify_ready(chip_model()).unwrap();
        let ctx = SessionContext::new(cache, Arc::new(HostEvents::new()));
        let viewer = ChipViewer::new();

        let first_container = HeadlessContainer::new(1280, 720);
        let first = viewer
            .init(&first_container, &ctx, ViewerConfig::default())
            .unwrap();
        let second_container = HeadlessContainer::new(1280, 720);
        let second = viewer
            .init(&second_container, &ctx, ViewerConfig::default())
            .unwrap();

        assert_eq!(first.state(), SessionState::Disposed);
        assert_eq!(second.state(), SessionState::Rendering);
        assert_ne!(first.id(), second.id());
        assert!(Arc::ptr_eq(&second.model().unwrap(), &model));
        assert_eq!(first_container.stats().releases, 1);
        assert_eq!(ctx.events.listener_count(), 1);

        viewer.dispose();
        assert!(viewer.current().is_none());
        assert_eq!(second.state(), SessionState::Disposed);
        assert_eq!(ctx.events.listener_count(), 0);
        assert_eq!(model.meshes().len(), 2);
    }

    #[tokio::test]
    async fn test_global_viewer() {
        let ctx = SessionContext::new(Arc::new(ModelCache::new()), Arc::new(HostEvents::new()));
        let session = ChipViewer::global()
            .init(&HeadlessContainer::new(800, 600), &ctx, ViewerConfig::default())
            .unwrap();
        assert_eq!(
            ChipViewer::global().current().map(|s| s.id()),
            Some(session.id())
        );
        ChipViewer::global().dispose();
        assert_eq!(session.state(), SessionState::Disposed);
    }
}
