//! Viewer error types

use thiserror::Error;

/// Errors that can occur while opening a viewer session
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("viewer session already initialized")]
    AlreadyInitialized,

    #[error("viewer session has been disposed")]
    Disposed,

    #[error("failed to create render surface: {0}")]
    Surface(String),

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}
