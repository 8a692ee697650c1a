//! Ordered load strategies, each producing the same `(model | error)` result.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{EnvironmentError, LoadError};
use crate::fetch::fetch_asset;
use crate::gltf_loader::parse_asset;
use crate::mesh::ParsedModel;
use crate::progress::ProgressReporter;
use crate::source::AssetSource;
use crate::worker::load_on_worker;

/// Where the fetch+parse work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Dedicated worker thread with its own runtime
    Worker,
    /// Fetch on the caller's runtime, parse once the host is idle or the
    /// deferral ceiling passes
    Idle,
    /// Fetch and parse inline on the calling task
    Immediate,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Worker => "worker",
            StrategyKind::Idle => "idle",
            StrategyKind::Immediate => "immediate",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an idle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleWake {
    Idle,
    Deadline,
}

/// Lets the host announce that it has spare time for deferred work.
#[derive(Debug, Default)]
pub struct IdleGate {
    notify: Notify,
}

impl IdleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal idleness. Remembered if nobody is waiting yet.
    pub fn signal_idle(&self) {
        self.notify.notify_one();
    }

    /// Wait for an idle signal, but never longer than `max_deferral`.
    pub async fn wait(&self, max_deferral: Duration) -> IdleWake {
        match tokio::time::timeout(max_deferral, self.notify.notified()).await {
            Ok(()) => IdleWake::Idle,
            Err(_) => IdleWake::Deadline,
        }
    }
}

/// Everything a strategy needs for one attempt.
pub struct StrategyContext<'a> {
    pub url: &'a str,
    pub source: &'a Arc<dyn AssetSource>,
    pub reporter: &'a ProgressReporter,
    pub idle: &'a IdleGate,
    pub max_deferral: Duration,
}

/// Run one strategy to completion.
pub async fn run_strategy(
    kind: StrategyKind,
    ctx: &StrategyContext<'_>,
) -> Result<ParsedModel, LoadError> {
    match kind {
        StrategyKind::Worker => load_on_worker(Arc::clone(ctx.source), ctx.url, ctx.reporter).await,
        StrategyKind::Idle => {
            let raw = fetch_asset(ctx.source.as_ref(), ctx.url, |p| ctx.reporter.report(p)).await?;
            let wake = ctx.idle.wait(ctx.max_deferral).await;
            debug!("Deferred parse starting ({:?})", wake);
            tokio::task::spawn_blocking(move || parse_asset(raw))
                .await
                .map_err(|e| EnvironmentError::WorkerCrashed(e.to_string()))?
                .map_err(LoadError::from)
        }
        StrategyKind::Immediate => {
            let inline = async {
                let raw = fetch_asset(ctx.source.as_ref(), ctx.url, |p| ctx.reporter.report(p))
                    .await
                    .map_err(LoadError::from)?;
                parse_asset(raw).map_err(LoadError::from)
            };
            AssertUnwindSafe(inline)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(EnvironmentError::WorkerCrashed(panic_message(&*panic)).into()))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "load panicked".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{triangle_glb, MemorySource};

    #[tokio::test(start_paused = true)]
    async fn test_idle_wait_hits_deadline() {
        let gate = IdleGate::new();
        let start = tokio::time::Instant::now();
        assert_eq!(gate.wait(Duration::from_secs(2)).await, IdleWake::Deadline);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_signal_releases_early() {
        let gate = IdleGate::new();
        gate.signal_idle();
        let start = tokio::time::Instant::now();
        assert_eq!(gate.wait(Duration::from_secs(2)).await, IdleWake::Idle);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_every_strategy_yields_the_same_model() {
        let body = triangle_glb("m2", [3.0, 1.0, 0.0]);
        let source: Arc<dyn AssetSource> = Arc::new(MemorySource::chunked(body, 32));
        let reporter = ProgressReporter::new(Vec::new());
        let idle = IdleGate::new();
        idle.signal_idle();
        let ctx = StrategyContext {
            url: "mem://chip.glb",
            source: &source,
            reporter: &reporter,
            idle: &idle,
            max_deferral: Duration::from_millis(50),
        };

        let worker = run_strategy(StrategyKind::Worker, &ctx).await.unwrap();
        let idle_model = run_strategy(StrategyKind::Idle, &ctx).await.unwrap();
        let immediate = run_strategy(StrategyKind::Immediate, &ctx).await.unwrap();
        assert_eq!(worker, idle_model);
        assert_eq!(worker, immediate);
    }

    #[tokio::test]
    async fn test_immediate_panic_becomes_environment_error() {
        let source: Arc<dyn AssetSource> =
            Arc::new(MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 32).panicking_opens(1));
        let reporter = ProgressReporter::new(Vec::new());
        let idle = IdleGate::new();
        let ctx = StrategyContext {
            url: "mem://chip.glb",
            source: &source,
            reporter: &reporter,
            idle: &idle,
            max_deferral: Duration::from_millis(50),
        };

        match run_strategy(StrategyKind::Immediate, &ctx).await {
            Err(LoadError::Environment(EnvironmentError::WorkerCrashed(msg))) => {
                assert!(msg.contains("simulated worker crash"));
            }
            other => panic!("expected WorkerCrashed, got: {:?}", other),
        }
    }

    #[test]
    fn test_strategy_names_round_trip_through_config() {
        let kinds: Vec<StrategyKind> = serde_json::from_str(r#"["worker","idle","immediate"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![StrategyKind::Worker, StrategyKind::Idle, StrategyKind::Immediate]
        );
        assert_eq!(StrategyKind::Idle.to_string(), "idle");
    }
}
