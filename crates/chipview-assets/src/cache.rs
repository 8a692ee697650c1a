//! The page-lifetime model cache.
//!
//! A single slot moving `Loading -> Ready | Failed` exactly once. The slot is
//! a `watch` channel: the pipeline is its only writer, and every waiter is a
//! receiver that resolves once when the state leaves `Loading`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{CacheError, LoadError};
use crate::mesh::ParsedModel;
use crate::progress::{Progress, ProgressSink};

/// Current state of the cache slot.
#[derive(Debug, Clone)]
pub enum CacheState {
    Loading,
    Ready(Arc<ParsedModel>),
    Failed(LoadError),
}

impl CacheState {
    pub fn is_loading(&self) -> bool {
        matches!(self, CacheState::Loading)
    }

    fn outcome(&self) -> Option<Result<Arc<ParsedModel>, LoadError>> {
        match self {
            CacheState::Loading => None,
            CacheState::Ready(model) => Some(Ok(Arc::clone(model))),
            CacheState::Failed(err) => Some(Err(err.clone())),
        }
    }
}

/// Answer to [`ModelCache::request`].
pub enum ModelRequest {
    /// The model is cached; attach synchronously.
    Ready(Arc<ParsedModel>),
    /// The pipeline already failed.
    Failed(LoadError),
    /// Still loading; await the waiter.
    Pending(Waiter),
}

/// A registered consumer of the in-flight model.
///
/// Resolves exactly once. Dropping it unregisters the waiter.
pub struct Waiter {
    rx: watch::Receiver<CacheState>,
}

impl Waiter {
    pub async fn wait(mut self) -> Result<Arc<ParsedModel>, LoadError> {
        let outcome = match self.rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.outcome(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(LoadError::CacheDropped))
    }
}

/// Single-slot cache for the parsed model.
pub struct ModelCache {
    state: watch::Sender<CacheState>,
    last_percent: AtomicU8,
}

impl ModelCache {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CacheState::Loading);
        Self {
            state,
            last_percent: AtomicU8::new(0),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> CacheState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), CacheState::Ready(_))
    }

    /// Get the model now if cached, otherwise register a waiter.
    pub fn request(&self) -> ModelRequest {
        // Subscribe before inspecting so a transition in between is still
        // observed by the waiter.
        let rx = self.state.subscribe();
        let outcome = rx.borrow().outcome();
        match outcome {
            Some(Ok(model)) => ModelRequest::Ready(model),
            Some(Err(err)) => ModelRequest::Failed(err),
            None => ModelRequest::Pending(Waiter { rx }),
        }
    }

    /// Await the model regardless of the current state.
    pub async fn get(&self) -> Result<Arc<ParsedModel>, LoadError> {
        match self.request() {
            ModelRequest::Ready(model) => Ok(model),
            ModelRequest::Failed(err) => Err(err),
            ModelRequest::Pending(waiter) => waiter.wait().await,
        }
    }

    /// Publish the model and release every waiter. Valid only from `Loading`.
    pub fn notify_ready(&self, model: ParsedModel) -> Result<Arc<ParsedModel>, CacheError> {
        let model = Arc::new(model);
        let stats = (model.meshes().len(), model.vertex_count(), model.triangle_count());
        let waiters = self.pending_waiters();
        if self.transition(CacheState::Ready(Arc::clone(&model))) {
            info!(
                "Model ready: {} meshes, {} vertices, {} triangles ({} waiters released)",
                stats.0, stats.1, stats.2, waiters
            );
            Ok(model)
        } else {
            warn!("Ignoring second model resolution");
            Err(CacheError::AlreadyResolved)
        }
    }

    /// Publish a failure and release every waiter. Valid only from `Loading`.
    pub fn notify_failed(&self, err: LoadError) -> Result<(), CacheError> {
        let message = err.to_string();
        if self.transition(CacheState::Failed(err)) {
            warn!("Model failed to load: {}", message);
            Ok(())
        } else {
            warn!("Ignoring failure after resolution: {}", message);
            Err(CacheError::AlreadyResolved)
        }
    }

    fn transition(&self, next: CacheState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_loading() {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Number of waiters still registered.
    pub fn pending_waiters(&self) -> usize {
        self.state.receiver_count()
    }

    /// Last reported download percentage, if any.
    pub fn last_percent(&self) -> Option<u8> {
        match self.last_percent.load(Ordering::Relaxed) {
            0 => None,
            pct => Some(pct),
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ModelCache {
    fn on_progress(&self, percent: u8, _progress: Progress) {
        self.last_percent.fetch_max(percent, Ordering::Relaxed);
    }
}
