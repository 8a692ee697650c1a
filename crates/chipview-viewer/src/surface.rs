//! Render surface abstraction and a headless implementation

use std::sync::Arc;

use chipview_assets::{LoadingIndicator, ParsedModel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::scene::DrawConstants;

/// Size of a container or surface in CSS-style pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Quality settings a surface is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    pub antialias: bool,
    pub pixel_ratio: f32,
}

/// Something a session draws into. Owned by exactly one session.
pub trait RenderSurface: Send {
    fn resize(&mut self, size: SurfaceSize);

    /// Make the shared model's geometry available to draws.
    fn upload_model(&mut self, model: &Arc<ParsedModel>);

    /// Drop this surface's reference to the shared model.
    fn remove_model(&mut self);

    fn draw(&mut self, constants: &DrawConstants);

    /// Finish the current frame.
    fn present(&mut self);

    /// Free the surface's own resources. Further calls are ignored.
    fn release(&mut self);
}

/// Host element a session renders into
pub trait Container: Send + Sync {
    fn size(&self) -> SurfaceSize;

    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }

    /// Whether the host is touch driven
    fn is_touch(&self) -> bool {
        false
    }

    /// The host's loading indicator, if it shows one
    fn loading_indicator(&self) -> Option<LoadingIndicator> {
        None
    }

    fn create_surface(
        &self,
        size: SurfaceSize,
        options: SurfaceOptions,
    ) -> Result<Box<dyn RenderSurface>, ViewerError>;
}

/// Everything a headless surface has been asked to do
#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    pub surfaces_created: usize,
    pub frames: u64,
    pub draws: u64,
    pub uploads: usize,
    pub removals: usize,
    pub releases: usize,
    pub resizes: usize,
    pub size: SurfaceSize,
    pub options: Option<SurfaceOptions>,
    pub attached: Option<Arc<ParsedModel>>,
}

/// Shared recorder for headless surfaces
#[derive(Debug, Default)]
pub struct SurfaceStats {
    inner: Mutex<SurfaceSnapshot>,
}

impl SurfaceStats {
    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.inner.lock().clone()
    }

    fn record(&self, f: impl FnOnce(&mut SurfaceSnapshot)) {
        let mut snapshot = self.inner.lock();
        f(&mut *snapshot);
    }
}

/// In-memory container for tests and the demo binary
#[derive(Clone)]
pub struct HeadlessContainer {
    size: SurfaceSize,
    pixel_ratio: f32,
    touch: bool,
    indicator: Option<LoadingIndicator>,
    stats: Arc<SurfaceStats>,
}

impl HeadlessContainer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: SurfaceSize::new(width, height),
            pixel_ratio: 1.0,
            touch: false,
            indicator: None,
            stats: Arc::new(SurfaceStats::default()),
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_touch(mut self, touch: bool) -> Self {
        self.touch = touch;
        self
    }

    pub fn with_indicator(mut self, indicator: LoadingIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn stats(&self) -> SurfaceSnapshot {
        self.stats.snapshot()
    }
}

impl Container for HeadlessContainer {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn is_touch(&self) -> bool {
        self.touch
    }

    fn loading_indicator(&self) -> Option<LoadingIndicator> {
        self.indicator.clone()
    }

    fn create_surface(
        &self,
        size: SurfaceSize,
        options: SurfaceOptions,
    ) -> Result<Box<dyn RenderSurface>, ViewerError> {
        self.stats.record(|s| {
            s.surfaces_created += 1;
            s.size = size;
            s.options = Some(options);
        });
        Ok(Box::new(HeadlessSurface {
            stats: self.stats.clone(),
            released: false,
        }))
    }
}

/// Surface that records calls instead of drawing
pub struct HeadlessSurface {
    stats: Arc<SurfaceStats>,
    released: bool,
}

impl RenderSurface for HeadlessSurface {
    fn resize(&mut self, size: SurfaceSize) {
        if self.released {
            return;
        }
        self.stats.record(|s| {
            s.resizes += 1;
            s.size = size;
        });
    }

    fn upload_model(&mut self, model: &Arc<ParsedModel>) {
        if self.released {
            return;
        }
        self.stats.record(|s| {
            s.uploads += 1;
            s.attached = Some(model.clone());
        });
    }

    fn remove_model(&mut self) {
        if self.released {
            return;
        }
        self.stats.record(|s| {
            if s.attached.take().is_some() {
                s.removals += 1;
            }
        });
    }

    fn draw(&mut self, _constants: &DrawConstants) {
        if !self.released {
            self.stats.record(|s| s.draws += 1);
        }
    }

    fn present(&mut self) {
        if !self.released {
            self.stats.record(|s| s.frames += 1);
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.record(|s| s.releases += 1);
        }
    }
}
