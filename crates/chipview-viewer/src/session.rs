//! Viewer sessions
//!
//! A session owns one render surface, a camera, its lights and its render
//! loop. The parsed model is shared with every other session and only ever
//! referenced: attaching uploads it to this session's surface, disposing
//! removes it again and leaves the model itself alone.

use std::fmt;
use std::sync::{Arc, Weak};

use chipview_assets::{
    LoadError, LoadingIndicator, LoadingIndicators, ModelCache, ModelRequest, ParsedModel,
    PreloadHandle,
};
use chipview_core::{FrameClock, Vec3};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::camera::OrbitControls;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::events::{HostEvent, HostEvents, ListenerId};
use crate::lighting::LightingRig;
use crate::render_loop::RenderLoop;
use crate::scene::SessionScene;
use crate::surface::{Container, RenderSurface, SurfaceSize};

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Surface ready, waiting for the model
    Attaching,
    /// Model attached
    Rendering,
    /// The model failed to load; the pane stays empty
    Failed,
    /// Torn down; terminal
    Disposed,
}

impl SessionState {
    fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Attaching | SessionState::Rendering | SessionState::Failed
        )
    }
}

/// What a session needs from the surrounding process
#[derive(Clone)]
pub struct SessionContext {
    pub cache: Arc<ModelCache>,
    pub events: Arc<HostEvents>,
    /// Registry the container's loading indicator joins, if any
    pub indicators: Option<Arc<LoadingIndicators>>,
}

impl SessionContext {
    pub fn new(cache: Arc<ModelCache>, events: Arc<HostEvents>) -> Self {
        Self {
            cache,
            events,
            indicators: None,
        }
    }

    /// Context backed by the process preload
    pub fn from_preload(preload: &PreloadHandle, events: Arc<HostEvents>) -> Self {
        Self {
            cache: preload.cache().clone(),
            events,
            indicators: Some(preload.indicators().clone()),
        }
    }
}

struct SessionCore {
    state: SessionState,
    surface: Option<Box<dyn RenderSurface>>,
    scene: SessionScene,
    controls: OrbitControls,
    clock: FrameClock,
    render_loop: RenderLoop,
    runtime: Option<Handle>,
    events: Option<Arc<HostEvents>>,
    listeners: Vec<ListenerId>,
    attach_task: Option<JoinHandle<()>>,
    resume_task: Option<JoinHandle<()>>,
    indicator: Option<LoadingIndicator>,
    viewport: SurfaceSize,
    visible: bool,
}

impl SessionCore {
    fn attach(&mut self, id: SessionId, model: Arc<ParsedModel>) {
        if let Some(surface) = self.surface.as_mut() {
            surface.upload_model(&model);
        }
        info!(
            "Session {} attached model ({} meshes)",
            id,
            model.meshes().len()
        );
        self.scene.attach(model);
        self.state = SessionState::Rendering;
        if let Some(indicator) = &self.indicator {
            indicator.hide();
        }
    }

    fn fail(&mut self, id: SessionId, err: &LoadError) {
        warn!("Session {} has no model: {}", id, err);
        self.state = SessionState::Failed;
        if let Some(indicator) = &self.indicator {
            indicator.show_failure();
        }
    }

    /// Release everything this session owns. The shared model is only detached.
    fn teardown(&mut self) {
        self.render_loop.stop();
        if let Some(task) = self.attach_task.take() {
            task.abort();
        }
        if let Some(task) = self.resume_task.take() {
            task.abort();
        }
        if let Some(events) = self.events.take() {
            for id in self.listeners.drain(..) {
                events.unsubscribe(id);
            }
        }
        self.scene.detach();
        if let Some(mut surface) = self.surface.take() {
            surface.remove_model();
            surface.release();
        }
        self.indicator = None;
        self.runtime = None;
    }
}

struct SessionInner {
    id: SessionId,
    config: ViewerConfig,
    weak: Weak<SessionInner>,
    core: Mutex<SessionCore>,
}

impl SessionInner {
    fn start_render(&self, core: &mut SessionCore) {
        if !core.visible || !core.state.is_live() {
            return;
        }
        let Some(runtime) = core.runtime.clone() else {
            return;
        };
        let weak = self.weak.clone();
        let started = core.render_loop.start(
            &runtime,
            Arc::new(move |dt| weak.upgrade().is_some_and(|inner| inner.frame(dt))),
        );
        if started {
            core.clock.resume();
            debug!("Session {} render loop started", self.id);
        }
    }

    fn stop_render(&self, core: &mut SessionCore) {
        if core.render_loop.stop() {
            core.clock.pause();
            debug!("Session {} render loop stopped", self.id);
        }
    }

    /// Render one frame. Returns false once the session can no longer draw.
    fn frame(&self, raw_delta: f32) -> bool {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        if !core.state.is_live() {
            return false;
        }
        let Some(surface) = core.surface.as_mut() else {
            return false;
        };

        core.clock.tick(raw_delta);
        core.controls.update(core.clock.delta_time);
        let view = core.controls.view_matrix();
        let projection = core.controls.projection_matrix();
        for constants in core.scene.draw_constants(view, projection) {
            surface.draw(&constants);
        }
        surface.present();
        true
    }

    /// Apply the cache outcome to a session still waiting for it.
    fn resolve(&self, result: Result<Arc<ParsedModel>, LoadError>) {
        let mut core = self.core.lock();
        if core.state != SessionState::Attaching || core.surface.is_none() {
            debug!("Session {} ignoring late model resolution", self.id);
            return;
        }
        core.attach_task = None;
        match result {
            Ok(model) => core.attach(self.id, model),
            Err(err) => core.fail(self.id, &err),
        }
    }

    fn handle_event(&self, event: &HostEvent) {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        if !core.state.is_live() {
            return;
        }

        match *event {
            HostEvent::Visibility(false) => {
                core.visible = false;
                self.stop_render(core);
            }
            HostEvent::Visibility(true) => {
                core.visible = true;
                self.start_render(core);
            }
            HostEvent::Resize(size) => {
                core.viewport = size;
                core.controls.set_viewport(size.width, size.height);
                if let Some(surface) = core.surface.as_mut() {
                    surface.resize(size);
                }
            }
            HostEvent::PointerDown => {
                if let Some(task) = core.resume_task.take() {
                    task.abort();
                }
                core.controls.set_auto_rotate(false);
            }
            HostEvent::PointerUp => {
                if let Some(task) = core.resume_task.take() {
                    task.abort();
                }
                let Some(runtime) = core.runtime.as_ref() else {
                    return;
                };
                let weak = self.weak.clone();
                let delay = self.config.resume_delay();
                core.resume_task = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.resume_auto_rotate();
                    }
                }));
            }
            HostEvent::Drag { delta } => {
                core.controls
                    .handle_drag(delta, core.viewport.height as f32);
            }
            HostEvent::Pan { delta } => {
                core.controls
                    .handle_pan(delta, core.viewport.height as f32);
            }
            HostEvent::Scroll(amount) => core.controls.handle_zoom(amount),
        }
    }

    fn resume_auto_rotate(&self) {
        let mut core = self.core.lock();
        if core.state.is_live() {
            core.resume_task = None;
            core.controls.set_auto_rotate(true);
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.core.get_mut().teardown();
    }
}

/// One open instance of the viewer. Clones share the same session.
#[derive(Clone)]
pub struct ViewerSession {
    inner: Arc<SessionInner>,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig) -> Self {
        let rig = LightingRig::new(&config.lighting);
        let controls = OrbitControls::with_config(config.camera.clone());
        let clock = FrameClock::new(config.clock.clone());
        let render_loop = RenderLoop::new(config.clock.frame_interval());

        let inner = Arc::new_cyclic(|weak| SessionInner {
            id: SessionId::new(),
            config,
            weak: weak.clone(),
            core: Mutex::new(SessionCore {
                state: SessionState::Uninitialized,
                surface: None,
                scene: SessionScene::new(rig),
                controls,
                clock,
                render_loop,
                runtime: None,
                events: None,
                listeners: Vec::new(),
                attach_task: None,
                resume_task: None,
                indicator: None,
                viewport: SurfaceSize::default(),
                visible: true,
            }),
        });
        Self { inner }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    /// Open the session in `container`.
    ///
    /// Attaches synchronously if the model is already cached, otherwise
    /// waits for the cache in the background. Valid once per session.
    pub fn init(&self, container: &dyn Container, ctx: &SessionContext) -> Result<(), ViewerError> {
        let runtime =
            Handle::try_current().map_err(|e| ViewerError::NoRuntime(e.to_string()))?;

        let inner = &self.inner;
        let mut guard = inner.core.lock();
        let core = &mut *guard;
        match core.state {
            SessionState::Uninitialized => {}
            SessionState::Disposed => return Err(ViewerError::Disposed),
            _ => return Err(ViewerError::AlreadyInitialized),
        }

        let size = container.size();
        let profile = inner.config.profile(container);
        let surface = container.create_surface(size, profile.options)?;
        info!(
            "Session {} opening {}x{} (compact: {}, pixel ratio {})",
            inner.id, size.width, size.height, profile.compact, profile.options.pixel_ratio
        );

        core.surface = Some(surface);
        core.viewport = size;
        core.controls.set_viewport(size.width, size.height);
        core.controls.set_pan_enabled(!profile.compact);
        core.runtime = Some(runtime.clone());
        core.state = SessionState::Attaching;

        let weak = inner.weak.clone();
        let listener = ctx.events.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        });
        core.listeners.push(listener);
        core.events = Some(ctx.events.clone());

        if let Some(indicator) = container.loading_indicator() {
            if let Some(percent) = ctx.cache.last_percent() {
                indicator.show_percent(percent);
            }
            if let Some(registry) = &ctx.indicators {
                registry.register(&indicator);
            }
            core.indicator = Some(indicator);
        }

        inner.start_render(core);

        match ctx.cache.request() {
            ModelRequest::Ready(model) => core.attach(inner.id, model),
            ModelRequest::Failed(err) => core.fail(inner.id, &err),
            ModelRequest::Pending(waiter) => {
                debug!("Session {} waiting for model", inner.id);
                let weak = inner.weak.clone();
                core.attach_task = Some(runtime.spawn(async move {
                    let result = waiter.wait().await;
                    if let Some(inner) = weak.upgrade() {
                        inner.resolve(result);
                    }
                }));
            }
        }

        Ok(())
    }

    /// Tear the session down. Safe from any state; later calls are no-ops.
    pub fn dispose(&self) {
        let mut core = self.inner.core.lock();
        if core.state == SessionState::Disposed {
            return;
        }
        core.state = SessionState::Disposed;
        core.teardown();
        info!("Session {} disposed", self.inner.id);
    }

    /// The shared model, if attached
    pub fn model(&self) -> Option<Arc<ParsedModel>> {
        self.inner.core.lock().scene.model().cloned()
    }

    pub fn is_render_loop_running(&self) -> bool {
        self.inner.core.lock().render_loop.is_running()
    }

    pub fn auto_rotate(&self) -> bool {
        self.inner.core.lock().controls.auto_rotate()
    }

    pub fn pan_enabled(&self) -> bool {
        self.inner.core.lock().controls.pan_enabled()
    }

    pub fn camera_position(&self) -> Vec3 {
        self.inner.core.lock().controls.position()
    }

    pub fn camera_target(&self) -> Vec3 {
        self.inner.core.lock().controls.target()
    }

    pub fn frame_count(&self) -> u64 {
        self.inner.core.lock().clock.frame_count
    }

    /// Listeners this session has registered on the host event bus
    pub fn listener_count(&self) -> usize {
        self.inner.core.lock().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::chip_model;
    use crate::surface::HeadlessContainer;
    use chipview_assets::{FetchError, ProgressSink, FAILURE_TEXT};
    use std::time::Duration;

    fn context() -> SessionContext {
        SessionContext::new(Arc::new(ModelCache::new()), Arc::new(HostEvents::new()))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_attach_is_synchronous() {
        let ctx = context();
        let model = ctx.cache.notify_ready(chip_model()).unwrap();
        let container = HeadlessContainer::new(1280, 720);

        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        assert_eq!(session.state(), SessionState::Rendering);
        assert!(Arc::ptr_eq(&session.model().unwrap(), &model));
        assert_eq!(ctx.cache.pending_waiters(), 0);
        let stats = container.stats();
        assert_eq!(stats.uploads, 1);
        assert_eq!(stats.surfaces_created, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_session_attaches_on_ready() {
        let ctx = context();
        let indicator = LoadingIndicator::new();
        let container = HeadlessContainer::new(1280, 720).with_indicator(indicator.clone());

        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();
        assert_eq!(session.state(), SessionState::Attaching);
        assert_eq!(ctx.cache.pending_waiters(), 1);
        assert!(session.is_render_loop_running());

        ctx.cache.notify_ready(chip_model()).unwrap();
        settle().await;

        assert_eq!(session.state(), SessionState::Rendering);
        assert!(!indicator.is_visible());
        assert_eq!(container.stats().uploads, 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(container.stats().draws >= 2 * 4);
    }

    #[tokio::test]
    async fn test_sessions_opened_before_load_share_one_fetch() {
        use chipview_assets::test_util::{triangle_glb, MemorySource};
        use chipview_assets::{PipelineConfig, Preloader};

        let (source, gate) = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 16).gated();
        let preload = Preloader::new(PipelineConfig {
            asset_base: "http://chip.test/models/".into(),
            asset_name: "chip.glb".into(),
            ..Default::default()
        })
        .with_source(Arc::new(source.clone()))
        .start();
        let ctx = SessionContext::from_preload(&preload, Arc::new(HostEvents::new()));

        let containers: Vec<_> = (0..3).map(|_| HeadlessContainer::new(1280, 720)).collect();
        let sessions: Vec<_> = containers
            .iter()
            .map(|container| {
                let session = ViewerSession::new(ViewerConfig::default());
                session.init(container, &ctx).unwrap();
                session
            })
            .collect();
        assert!(sessions.iter().all(|s| s.state() == SessionState::Attaching));

        gate.notify_one();
        preload.join().await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while sessions.iter().any(|s| s.state() != SessionState::Rendering) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sessions never attached");

        assert_eq!(source.open_count(), 1);
        let model = preload.cache().get().await.unwrap();
        for (session, container) in sessions.iter().zip(&containers) {
            assert!(Arc::ptr_eq(&session.model().unwrap(), &model));
            assert_eq!(container.stats().uploads, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disposed_waiter_ignores_resolution() {
        let ctx = context();
        let container = HeadlessContainer::new(1280, 720);
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        session.dispose();
        ctx.cache.notify_ready(chip_model()).unwrap();
        settle().await;

        assert_eq!(session.state(), SessionState::Disposed);
        assert!(session.model().is_none());
        let stats = container.stats();
        assert_eq!(stats.uploads, 0);
        assert_eq!(stats.releases, 1);
        assert_eq!(ctx.cache.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_leaves_other_sessions_alone() {
        let ctx = context();
        ctx.cache.notify_ready(chip_model()).unwrap();
        let container_a = HeadlessContainer::new(1280, 720);
        let container_b = HeadlessContainer::new(1280, 720);

        let a = ViewerSession::new(ViewerConfig::default());
        let b = ViewerSession::new(ViewerConfig::default());
        a.init(&container_a, &ctx).unwrap();
        b.init(&container_b, &ctx).unwrap();
        assert_eq!(ctx.events.listener_count(), 2);

        a.dispose();
        let a_stats = container_a.stats();
        assert_eq!(a_stats.removals, 1);
        assert_eq!(a_stats.releases, 1);
        assert!(a_stats.attached.is_none());
        assert_eq!(a.listener_count(), 0);

        assert_eq!(b.state(), SessionState::Rendering);
        assert_eq!(b.listener_count(), 1);
        assert_eq!(ctx.events.listener_count(), 1);
        assert!(b.is_render_loop_running());
        assert!(container_b.stats().attached.is_some());

        let frames = container_b.stats().frames;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(container_b.stats().frames > frames);
        assert_eq!(container_a.stats().frames, a_stats.frames);

        // Host events still reach B
        ctx.events.emit(HostEvent::PointerDown);
        assert!(!b.auto_rotate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_loop_follows_visibility() {
        let ctx = context();
        ctx.cache.notify_ready(chip_model()).unwrap();
        let container = HeadlessContainer::new(1280, 720);
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        ctx.events.emit(HostEvent::Visibility(false));
        assert!(!session.is_render_loop_running());
        let frames = container.stats().frames;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(container.stats().frames, frames);

        ctx.events.emit(HostEvent::Visibility(true));
        assert!(session.is_render_loop_running());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(container.stats().frames > frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_pauses_auto_rotation() {
        let ctx = context();
        let container = HeadlessContainer::new(1280, 720);
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();
        assert!(session.auto_rotate());

        ctx.events.emit(HostEvent::PointerDown);
        assert!(!session.auto_rotate());
        ctx.events.emit(HostEvent::PointerUp);

        tokio::time::sleep(Duration::from_millis(2400)).await;
        assert!(!session.auto_rotate());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(session.auto_rotate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_drag_cancels_pending_resume() {
        let ctx = context();
        let container = HeadlessContainer::new(1280, 720);
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        ctx.events.emit(HostEvent::PointerDown);
        ctx.events.emit(HostEvent::PointerUp);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        ctx.events.emit(HostEvent::PointerDown);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!session.auto_rotate());
    }

    #[tokio::test]
    async fn test_init_is_once_per_session() {
        let ctx = context();
        let container = HeadlessContainer::new(1280, 720);
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        assert!(matches!(
            session.init(&container, &ctx),
            Err(ViewerError::AlreadyInitialized)
        ));
        session.dispose();
        session.dispose();
        assert!(matches!(
            session.init(&container, &ctx),
            Err(ViewerError::Disposed)
        ));
        assert_eq!(container.stats().surfaces_created, 1);
    }

    #[tokio::test]
    async fn test_failed_model_shows_message() {
        let ctx = context();
        let indicator = LoadingIndicator::new();
        let container = HeadlessContainer::new(1280, 720).with_indicator(indicator.clone());
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        ctx.cache
            .notify_failed(LoadError::Fetch(FetchError::Status {
                url: "http://chip.test/chip.glb".into(),
                status: 500,
            }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(indicator.text(), FAILURE_TEXT);
        assert!(indicator.state().error);
        assert_eq!(container.stats().uploads, 0);
    }

    #[tokio::test]
    async fn test_indicator_shows_progress_so_far() {
        let ctx = context();
        ctx.cache.on_progress(
            42,
            chipview_assets::Progress {
                received: 42,
                total: Some(100),
            },
        );
        let indicator = LoadingIndicator::new();
        let container = HeadlessContainer::new(1280, 720).with_indicator(indicator.clone());
        let session = ViewerSession::new(ViewerConfig::default());
        session.init(&container, &ctx).unwrap();

        assert_eq!(indicator.text(), "Loading… 42%");
    }

    #[tokio::test]
    async fn test_compact_container_disables_pan() {
        let ctx = context();
        let session = ViewerSession::new(ViewerConfig::default());
        session
            .init(&HeadlessContainer::new(390, 700), &ctx)
            .unwrap();
        assert!(!session.pan_enabled());

        let desktop = ViewerSession::new(ViewerConfig::default());
        desktop
            .init(&HeadlessContainer::new(1280, 720), &ctx)
            .unwrap();
        assert!(desktop.pan_enabled());

        let pan = HostEvent::Pan {
            delta: chipview_core::Vec2::new(40.0, 20.0),
        };
        let compact_target = session.camera_target();
        let desktop_target = desktop.camera_target();
        ctx.events.emit(pan);
        assert_eq!(session.camera_target(), compact_target);
        assert_ne!(desktop.camera_target(), desktop_target);
    }
}
