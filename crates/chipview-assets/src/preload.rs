//! Process-wide preload: starts the pipeline once, before any viewer exists.

use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::ModelCache;
use crate::error::{CacheError, EnvironmentError, LoadError};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
use crate::progress::{LoadingIndicators, ProgressReporter, ProgressSink};
use crate::source::AssetSource;
use crate::strategy::IdleGate;

static GLOBAL: Mutex<Option<Arc<PreloadHandle>>> = const_mutex(None);

/// Builder for the preload pipeline.
pub struct Preloader {
    config: PipelineConfig,
    source: Option<Arc<dyn AssetSource>>,
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl Preloader {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            sinks: Vec::new(),
        }
    }

    /// Replace the default HTTP/file source.
    pub fn with_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Add a progress consumer next to the cache and loading indicators.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Start the pipeline on the current tokio runtime.
    ///
    /// Never fails: anything that prevents the pipeline from starting
    /// becomes the cache's failure.
    pub fn start(self) -> PreloadHandle {
        let cache = Arc::new(ModelCache::new());
        let indicators = Arc::new(LoadingIndicators::new());
        let idle = Arc::new(IdleGate::new());

        let mut handle = PreloadHandle {
            url: String::new(),
            cache: cache.clone(),
            indicators: indicators.clone(),
            idle: idle.clone(),
            task: Mutex::new(None),
        };

        let prepared = self.config.asset_url().and_then(|url| {
            let source = match self.source {
                Some(source) => source,
                None => self.config.default_source()?,
            };
            Ok((url, source))
        });
        let (url, source) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                let _ = cache.notify_failed(err.into());
                return handle;
            }
        };
        handle.url = url.clone();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = cache.notify_failed(EnvironmentError::NoRuntime(err.to_string()).into());
                return handle;
            }
        };

        let cache_sink: Arc<dyn ProgressSink> = cache.clone();
        let indicator_sink: Arc<dyn ProgressSink> = indicators;
        let mut sinks = vec![cache_sink, indicator_sink];
        sinks.extend(self.sinks);
        let reporter = Arc::new(ProgressReporter::new(sinks));

        info!("Preloading model from {}", url);
        let pipeline = Pipeline::new(url, source, &self.config, idle, reporter, cache);
        *handle.task.get_mut() = Some(runtime.spawn(pipeline.run()));
        handle
    }

    /// Start the pipeline and publish it as the process-wide preload.
    pub fn install(self) -> Result<Arc<PreloadHandle>, CacheError> {
        let mut global = GLOBAL.lock();
        if global.is_some() {
            warn!("Preload already installed; ignoring second start");
            return Err(CacheError::PreloadInstalled);
        }
        let handle = Arc::new(self.start());
        *global = Some(handle.clone());
        Ok(handle)
    }
}

/// The process-wide preload, if one was installed.
pub fn global() -> Option<Arc<PreloadHandle>> {
    GLOBAL.lock().clone()
}

/// A running (or finished) preload.
///
/// Dropping the handle detaches the pipeline; it still resolves the cache.
pub struct PreloadHandle {
    url: String,
    cache: Arc<ModelCache>,
    indicators: Arc<LoadingIndicators>,
    idle: Arc<IdleGate>,
    task: Mutex<Option<JoinHandle<PipelineReport>>>,
}

impl PreloadHandle {
    /// Resolved asset URL. Empty if it could not be resolved.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Registry viewers add their loading indicators to.
    pub fn indicators(&self) -> &Arc<LoadingIndicators> {
        &self.indicators
    }

    /// Gate the host signals when it has idle time.
    pub fn idle_gate(&self) -> &Arc<IdleGate> {
        &self.idle
    }

    /// Wait for the pipeline task. Returns `None` if it never started or was
    /// already joined.
    pub async fn join(&self) -> Option<Result<PipelineReport, LoadError>> {
        let task = self.task.lock().take()?;
        Some(task.await.map_err(|e| {
            LoadError::from(EnvironmentError::WorkerCrashed(e.to_string()))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheState, ModelRequest};
    use crate::error::FetchError;
    use crate::progress::LoadingIndicator;
    use crate::strategy::StrategyKind;
    use crate::test_util::{triangle_glb, MemorySource};

    fn config() -> PipelineConfig {
        PipelineConfig {
            asset_base: "http://chip.test/models/".into(),
            asset_name: "chip.glb".into(),
            strategies: vec![StrategyKind::Immediate],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_waiters_registered_before_completion_all_resolve() {
        let (source, gate) = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 16).gated();
        let handle = Preloader::new(config())
            .with_source(Arc::new(source.clone()))
            .start();
        assert_eq!(handle.url(), "http://chip.test/models/chip.glb");

        let waiters: Vec<_> = (0..3)
            .map(|_| match handle.cache().request() {
                ModelRequest::Pending(waiter) => waiter,
                _ => panic!("model resolved before the source was released"),
            })
            .collect();

        gate.notify_one();
        let mut models = Vec::new();
        for waiter in waiters {
            models.push(waiter.wait().await.unwrap());
        }
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        let report = handle.join().await.unwrap().unwrap();
        assert_eq!(report.attempts, vec![StrategyKind::Immediate]);
        assert_eq!(source.open_count(), 1);
        assert_eq!(handle.cache().last_percent(), Some(100));
    }

    #[tokio::test]
    async fn test_indicators_follow_progress() {
        let (source, gate) = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 16).gated();
        let handle = Preloader::new(config()).with_source(Arc::new(source)).start();
        let indicator = LoadingIndicator::new();
        handle.indicators().register(&indicator);

        gate.notify_one();
        handle.cache().get().await.unwrap();
        assert_eq!(indicator.text(), "Loading… 100%");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_immediately() {
        let config = PipelineConfig {
            asset_base: "not a url".into(),
            ..config()
        };
        let handle = Preloader::new(config)
            .with_source(Arc::new(MemorySource::chunked(Vec::new(), 1)))
            .start();

        assert!(matches!(
            handle.cache().state(),
            CacheState::Failed(LoadError::Fetch(FetchError::InvalidUrl { .. }))
        ));
        assert!(handle.join().await.is_none());
    }

    #[test]
    fn test_start_without_runtime_fails_the_cache() {
        let handle = Preloader::new(config())
            .with_source(Arc::new(MemorySource::chunked(Vec::new(), 1)))
            .start();
        assert!(matches!(
            handle.cache().state(),
            CacheState::Failed(LoadError::Environment(EnvironmentError::NoRuntime(_)))
        ));
    }

    #[tokio::test]
    async fn test_dropped_handle_still_resolves_waiters() {
        let (source, gate) = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 16).gated();
        let handle = Preloader::new(config()).with_source(Arc::new(source)).start();
        let cache = handle.cache().clone();
        let ModelRequest::Pending(waiter) = cache.request() else {
            panic!("model resolved before the source was released");
        };

        drop(handle);
        gate.notify_one();

        let model = tokio::time::timeout(std::time::Duration::from_secs(5), waiter.wait())
            .await
            .expect("waiter never resolved")
            .unwrap();
        assert!(Arc::ptr_eq(&model, &cache.get().await.unwrap()));
    }

    #[tokio::test]
    async fn test_panicking_immediate_load_fails_waiters() {
        let source = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 16).panicking_opens(1);
        let handle = Preloader::new(config()).with_source(Arc::new(source)).start();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle.cache().get())
            .await
            .expect("waiter never resolved");
        assert!(matches!(
            result,
            Err(LoadError::Environment(EnvironmentError::WorkerCrashed(_)))
        ));
        assert!(handle.join().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_install_is_once_per_process() {
        let source = Arc::new(MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 64));
        let first = Preloader::new(config())
            .with_source(source.clone())
            .install()
            .unwrap();
        let second = Preloader::new(config()).with_source(source).install();

        assert_eq!(second.err(), Some(CacheError::PreloadInstalled));
        assert!(Arc::ptr_eq(&first, &global().unwrap()));
        first.cache().get().await.unwrap();
    }
}
