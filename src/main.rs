//! ChipView - preloads the chip model and renders it in a headless viewer
//!
//! Usage: `chipview [--write-settings] [ASSET]` where `ASSET` is a URL, a
//! name relative to the configured asset base, or a local file.

mod settings;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use chipview_assets::{AssetLocator, LoadingIndicator, Preloader, ProgressLog};
use chipview_viewer::{ChipViewer, HeadlessContainer, HostEvent, HostEvents, SessionContext};

use crate::settings::AppSettings;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    info!("Starting ChipView...");

    let mut settings = AppSettings::load();
    let mut write_settings = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-settings" {
            write_settings = true;
        } else {
            apply_asset_arg(&mut settings, &arg)?;
        }
    }
    if write_settings {
        settings.save().context("Failed to save settings")?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("chipview")
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(settings))
}

/// Point the pipeline at a local file or URL given on the command line
fn apply_asset_arg(settings: &mut AppSettings, arg: &str) -> Result<()> {
    let path = Path::new(arg);
    if !path.is_file() {
        settings.pipeline.asset_name = arg.to_string();
        return Ok(());
    }

    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", arg))?;
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        anyhow::bail!("Not a file path: {}", arg);
    };
    let locator = AssetLocator::from_dir(dir)?;
    settings.pipeline.asset_base = locator.base().to_string();
    settings.pipeline.asset_name = name.to_string_lossy().into_owned();
    Ok(())
}

async fn run(settings: AppSettings) -> Result<()> {
    // The preload starts before any viewer exists
    let preload = Preloader::new(settings.pipeline.clone())
        .with_sink(Arc::new(ProgressLog::new(10)))
        .install()
        .context("Failed to start preload")?;

    let events = Arc::new(HostEvents::new());
    let ctx = SessionContext::from_preload(&preload, events.clone());
    let indicator = LoadingIndicator::new();
    let container = HeadlessContainer::new(settings.demo.width, settings.demo.height)
        .with_pixel_ratio(settings.demo.pixel_ratio)
        .with_indicator(indicator.clone());

    let viewer = ChipViewer::global();
    let session = viewer
        .init(&container, &ctx, settings.viewer.clone())
        .context("Failed to open viewer")?;
    info!("Opened session {}", session.id());

    // Nothing else competes for the host; let a deferred parse run now
    preload.idle_gate().signal_idle();

    let outcome = preload.cache().get().await;
    match &outcome {
        Ok(model) => info!(
            "Model attached: {} meshes, scale {:.4}, {:.1} MiB of geometry",
            model.meshes().len(),
            model.scale_factor(),
            model.byte_size() as f64 / (1024.0 * 1024.0)
        ),
        Err(e) => warn!("{} ({})", indicator.text(), e),
    }

    tokio::time::sleep(settings.demo.render_duration()).await;
    events.emit(HostEvent::Visibility(false));

    let stats = container.stats();
    info!(
        "Rendered {} frames, {} draws (session {:?})",
        stats.frames,
        stats.draws,
        session.state()
    );

    viewer.dispose();

    if let Some(report) = preload.join().await {
        let report = report.context("Preload task failed")?;
        let attempts: Vec<&str> = report.attempts.iter().map(|k| k.name()).collect();
        info!("Preload strategies tried: {}", attempts.join(" -> "));
    }

    outcome.map(|_| ()).context("Model failed to load")
}
