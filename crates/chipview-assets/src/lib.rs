//! ChipView Assets - Background model preload
//!
//! Streams the chip model over HTTP (or from disk), parses the glTF/GLB
//! payload off the render path, normalizes it to a fixed reference size and
//! caches it once for every viewer in the process.

mod cache;
mod error;
mod fetch;
mod gltf_loader;
mod mesh;
mod message;
mod pipeline;
mod preload;
mod progress;
mod source;
mod strategy;
mod worker;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use cache::{CacheState, ModelCache, ModelRequest, Waiter};
pub use error::{CacheError, EnvironmentError, FetchError, LoadError, ParseError};
pub use fetch::{fetch_asset, RawAsset};
pub use gltf_loader::{parse_asset, parse_model};
pub use mesh::{
    compute_vertex_normals, IndexData, IndexWidth, Normalization, ParsedMesh, ParsedModel,
    REFERENCE_SIZE,
};
pub use message::{MeshPayload, ModelPayload, WorkerMessage, WorkerRequest};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use preload::{global, PreloadHandle, Preloader};
pub use progress::{
    IndicatorState, LoadingIndicator, LoadingIndicators, Progress, ProgressLog, ProgressReporter,
    ProgressSink, FAILURE_TEXT,
};
pub use source::{
    AssetLocator, AssetSource, AssetStream, FileSource, HttpSource, UrlSource, DEFAULT_CHUNK_SIZE,
};
pub use strategy::{run_strategy, IdleGate, IdleWake, StrategyContext, StrategyKind};
pub use worker::{load_on_worker, ModelWorker, WORKER_THREAD_NAME};
