use serde::{Deserialize, Serialize};

/// Transport failures while downloading the model asset.
///
/// Payloads are plain strings and numbers so the error can travel from the
/// background worker to the cache unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum FetchError {
    #[error("invalid asset URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP {status} fetching '{url}'")]
    Status { url: String, status: u16 },

    #[error("network error fetching '{url}': {message}")]
    Transport { url: String, message: String },

    #[error("I/O error reading '{path}': {message}")]
    Io { path: String, message: String },

    #[error("stream for '{url}' ended after {received} of {expected} bytes")]
    Incomplete {
        url: String,
        received: u64,
        expected: u64,
    },
}

impl FetchError {
    pub(crate) fn transport(url: &str, err: reqwest::Error) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl std::fmt::Display, err: std::io::Error) -> Self {
        FetchError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// Malformed or unsupported model data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ParseError {
    #[error("asset truncated: {len} bytes is shorter than any model header")]
    Truncated { len: usize },

    #[error("unrecognized asset format (leading bytes {magic:02x?})")]
    UnrecognizedFormat { magic: Vec<u8> },

    #[error("malformed glTF: {0}")]
    Malformed(String),

    #[error("mesh '{mesh}' has {len} position components, not a multiple of 3")]
    InvalidPositions { mesh: String, len: usize },

    #[error("mesh '{mesh}' references vertex {index} but has only {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },

    #[error("mesh '{mesh}' has {normals} normal components for {positions} position components")]
    NormalCountMismatch {
        mesh: String,
        normals: usize,
        positions: usize,
    },

    #[error("asset contains no triangle geometry")]
    Empty,
}

/// The background execution context could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum EnvironmentError {
    #[error("failed to spawn model worker: {0}")]
    WorkerSpawn(String),

    #[error("failed to build worker runtime: {0}")]
    Runtime(String),

    #[error("model worker exited without a result: {0}")]
    WorkerCrashed(String),

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("no load strategy configured")]
    NoStrategy,
}

/// Terminal outcome of a failed fetch/parse pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("model cache was dropped before the model resolved")]
    CacheDropped,

    #[error("model cache was already resolved by another writer")]
    AlreadyResolved,
}

impl LoadError {
    /// Environment failures are answered by the next load strategy rather
    /// than by failing the cache.
    pub fn is_environment(&self) -> bool {
        matches!(self, LoadError::Environment(_))
    }
}

/// Misuse of the single-writer cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("model cache already resolved")]
    AlreadyResolved,

    #[error("a preload pipeline is already installed")]
    PreloadInstalled,
}
