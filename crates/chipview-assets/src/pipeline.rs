//! The one-time fetch+parse pipeline feeding the model cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::ModelCache;
use crate::error::{EnvironmentError, FetchError, LoadError};
use crate::progress::ProgressReporter;
use crate::source::{AssetLocator, AssetSource, UrlSource};
use crate::strategy::{run_strategy, IdleGate, StrategyContext, StrategyKind};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base location the asset name is resolved against
    pub asset_base: String,
    /// Asset file name or relative URL
    pub asset_name: String,
    /// Strategies in the order they are tried
    pub strategies: Vec<StrategyKind>,
    /// Longest the idle strategy waits before parsing anyway, in milliseconds
    pub idle_max_deferral_ms: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Read size for local files, in bytes
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            asset_base: "http://localhost:8080/".into(),
            asset_name: "Final%20Chip.glb".into(),
            strategies: vec![StrategyKind::Worker, StrategyKind::Idle],
            idle_max_deferral_ms: 2000,
            request_timeout_secs: 300,
            chunk_size: crate::source::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Absolute URL of the asset.
    pub fn asset_url(&self) -> Result<String, FetchError> {
        AssetLocator::new(&self.asset_base)?.resolve(&self.asset_name)
    }

    pub fn idle_max_deferral(&self) -> Duration {
        Duration::from_millis(self.idle_max_deferral_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The default HTTP/file source for this configuration.
    pub fn default_source(&self) -> Result<Arc<dyn AssetSource>, FetchError> {
        Ok(Arc::new(UrlSource::new(self.request_timeout(), self.chunk_size)?))
    }
}

/// What a pipeline run did.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Strategies started, in order
    pub attempts: Vec<StrategyKind>,
    /// Final outcome written to the cache
    pub outcome: Result<(), LoadError>,
}

/// Fails the cache if a run ends without resolving it, whether it unwound or
/// its task was dropped.
struct ResolveGuard<'a> {
    cache: &'a ModelCache,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        if self.cache.state().is_loading() {
            let _ = self.cache.notify_failed(
                EnvironmentError::WorkerCrashed("pipeline ended without a result".into()).into(),
            );
        }
    }
}

/// A single fetch+parse run that resolves `cache` exactly once.
pub struct Pipeline {
    url: String,
    source: Arc<dyn AssetSource>,
    strategies: Vec<StrategyKind>,
    max_deferral: Duration,
    idle: Arc<IdleGate>,
    reporter: Arc<ProgressReporter>,
    cache: Arc<ModelCache>,
}

impl Pipeline {
    pub fn new(
        url: String,
        source: Arc<dyn AssetSource>,
        config: &PipelineConfig,
        idle: Arc<IdleGate>,
        reporter: Arc<ProgressReporter>,
        cache: Arc<ModelCache>,
    ) -> Self {
        let mut strategies: Vec<StrategyKind> = Vec::with_capacity(config.strategies.len());
        for kind in &config.strategies {
            if !strategies.contains(kind) {
                strategies.push(*kind);
            }
        }

        Self {
            url,
            source,
            strategies,
            max_deferral: config.idle_max_deferral(),
            idle,
            reporter,
            cache,
        }
    }

    /// Try each strategy once. Environment failures fall through to the next
    /// strategy; fetch and parse failures are final.
    pub async fn run(self) -> PipelineReport {
        let _guard = ResolveGuard { cache: &self.cache };
        let ctx = StrategyContext {
            url: &self.url,
            source: &self.source,
            reporter: &self.reporter,
            idle: &self.idle,
            max_deferral: self.max_deferral,
        };

        let mut attempts = Vec::new();
        let mut result: Result<_, LoadError> =
            Err(EnvironmentError::NoStrategy.into());

        for &kind in &self.strategies {
            attempts.push(kind);
            info!("Loading '{}' via {} strategy", self.url, kind);
            result = run_strategy(kind, &ctx).await;
            match &result {
                Err(err) if err.is_environment() => {
                    warn!("{} strategy unavailable: {}", kind, err);
                }
                _ => break,
            }
        }

        // No progress may follow the terminal event.
        self.reporter.close();

        let outcome = match result {
            Ok(model) => match self.cache.notify_ready(model) {
                Ok(_) => Ok(()),
                Err(e) => {
                    warn!("Pipeline result discarded: {}", e);
                    Err(LoadError::AlreadyResolved)
                }
            },
            Err(err) => {
                if let Err(e) = self.cache.notify_failed(err.clone()) {
                    warn!("Pipeline failure discarded: {}", e);
                }
                Err(err)
            }
        };

        PipelineReport { attempts, outcome }
    }
}
