//! Background worker that fetches and parses the model on its own thread.
//!
//! The worker owns a current-thread tokio runtime and talks to the caller
//! exclusively through [`WorkerRequest`] / [`WorkerMessage`] channels.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{EnvironmentError, LoadError};
use crate::fetch::fetch_asset;
use crate::gltf_loader::parse_asset;
use crate::mesh::ParsedModel;
use crate::message::{ModelPayload, WorkerMessage, WorkerRequest};
use crate::progress::ProgressReporter;
use crate::source::AssetSource;

pub const WORKER_THREAD_NAME: &str = "chip-worker";

/// Handle to a running worker thread.
pub struct ModelWorker {
    requests: Option<mpsc::UnboundedSender<WorkerRequest>>,
    messages: mpsc::UnboundedReceiver<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl ModelWorker {
    /// Start the worker thread.
    pub fn spawn(source: Arc<dyn AssetSource>) -> Result<Self, EnvironmentError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || worker_main(source, request_rx, message_tx))
            .map_err(|e| EnvironmentError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            requests: Some(request_tx),
            messages: message_rx,
            thread: Some(thread),
        })
    }

    pub fn post(&self, request: WorkerRequest) -> Result<(), EnvironmentError> {
        self.requests
            .as_ref()
            .ok_or_else(|| EnvironmentError::WorkerCrashed("worker terminated".into()))?
            .send(request)
            .map_err(|_| EnvironmentError::WorkerCrashed("worker is not accepting requests".into()))
    }

    /// Next message, or `None` once the worker is gone.
    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        self.messages.recv().await
    }

    /// Ask the worker to exit after its current request.
    pub fn terminate(&mut self) {
        self.requests.take();
    }

    /// Wait for the thread to exit and describe why it stopped.
    async fn exit_reason(&mut self) -> String {
        let Some(thread) = self.thread.take() else {
            return "worker already joined".into();
        };
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => "worker exited".into(),
            Ok(Err(panic)) => panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".into()),
            Err(join) => join.to_string(),
        }
    }
}

fn worker_main(
    source: Arc<dyn AssetSource>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = messages.send(WorkerMessage::Failed(
                EnvironmentError::Runtime(e.to_string()).into(),
            ));
            return;
        }
    };

    runtime.block_on(async {
        while let Some(request) = requests.recv().await {
            match request {
                WorkerRequest::Parse { url } => handle_parse(source.as_ref(), &url, &messages).await,
            }
        }
    });
    debug!("Model worker exiting");
}

async fn handle_parse(
    source: &dyn AssetSource,
    url: &str,
    messages: &mpsc::UnboundedSender<WorkerMessage>,
) {
    let result = async {
        let raw = fetch_asset(source, url, |progress| {
            let _ = messages.send(WorkerMessage::Progress(progress));
        })
        .await?;
        let model = parse_asset(raw)?;
        Ok::<_, LoadError>(model)
    }
    .await;

    let message = match result {
        Ok(model) => WorkerMessage::Done(ModelPayload::from(model)),
        Err(err) => WorkerMessage::Failed(err),
    };
    let _ = messages.send(message);
}

/// Run one fetch+parse on a fresh worker, forwarding its progress.
pub async fn load_on_worker(
    source: Arc<dyn AssetSource>,
    url: &str,
    reporter: &ProgressReporter,
) -> Result<ParsedModel, LoadError> {
    let mut worker = ModelWorker::spawn(source)?;
    worker.post(WorkerRequest::Parse {
        url: url.to_string(),
    })?;

    while let Some(message) = worker.recv().await {
        match message {
            WorkerMessage::Progress(progress) => reporter.report(progress),
            WorkerMessage::Done(payload) => {
                worker.terminate();
                debug!("Worker delivered {} bytes of geometry", payload.byte_size());
                return payload.into_model().map_err(LoadError::from);
            }
            WorkerMessage::Failed(err) => {
                worker.terminate();
                return Err(err);
            }
        }
    }

    let reason = worker.exit_reason().await;
    warn!("Model worker crashed: {}", reason);
    Err(EnvironmentError::WorkerCrashed(reason).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ParseError};
    use crate::test_util::{triangle_glb, MemorySource};

    #[tokio::test]
    async fn test_worker_parses_off_thread() {
        let source = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 64);
        let reporter = ProgressReporter::new(Vec::new());
        let model = load_on_worker(Arc::new(source.clone()), "mem://chip.glb", &reporter)
            .await
            .unwrap();
        assert_eq!(model.meshes()[0].name, "m1");
        assert_eq!(reporter.last_percent(), Some(100));
        assert_eq!(source.open_count(), 1);
    }

    #[tokio::test]
    async fn test_worker_reports_fetch_failure() {
        let source = MemorySource::failing(FetchError::Status {
            url: "mem://chip.glb".into(),
            status: 404,
        });
        let reporter = ProgressReporter::new(Vec::new());
        let err = load_on_worker(Arc::new(source), "mem://chip.glb", &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Fetch(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_worker_reports_parse_failure() {
        let source = MemorySource::chunked(b"not a model at all".to_vec(), 8);
        let reporter = ProgressReporter::new(Vec::new());
        let err = load_on_worker(Arc::new(source), "mem://chip.glb", &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse(ParseError::UnrecognizedFormat { .. })));
    }

    #[tokio::test]
    async fn test_worker_crash_is_an_environment_error() {
        let source = MemorySource::chunked(triangle_glb("m1", [0.0; 3]), 64).panicking_opens(1);
        let reporter = ProgressReporter::new(Vec::new());
        let err = load_on_worker(Arc::new(source), "mem://chip.glb", &reporter)
            .await
            .unwrap_err();
        match err {
            LoadError::Environment(EnvironmentError::WorkerCrashed(reason)) => {
                assert!(reason.contains("simulated worker crash"), "{}", reason);
            }
            other => panic!("expected WorkerCrashed, got: {:?}", other),
        }
    }
}
