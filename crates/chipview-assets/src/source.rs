//! Byte sources the fetcher streams the model from.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::FetchError;

/// Default read size for file-backed streams.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// An open download.
#[async_trait]
pub trait AssetStream: Send {
    /// Total size if the source announced one.
    fn total_len(&self) -> Option<u64>;

    /// Next chunk of the body, or `None` once the body is complete.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError>;
}

/// Opens asset URLs as byte streams.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn AssetStream>, FetchError>;
}

/// Resolves asset names against a base location.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    base: Url,
}

impl AssetLocator {
    /// `base` is an absolute URL (`https://…/` or `file:///…/`).
    pub fn new(base: &str) -> Result<Self, FetchError> {
        let base = Url::parse(base).map_err(|e| FetchError::InvalidUrl {
            url: base.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { base })
    }

    /// Locator rooted at a local directory.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let dir = dir.into();
        let base = Url::from_directory_path(&dir).map_err(|()| FetchError::InvalidUrl {
            url: dir.display().to_string(),
            message: "not an absolute directory path".into(),
        })?;
        Ok(Self { base })
    }

    /// Resolve `name` relative to the base. Absolute URLs pass through.
    pub fn resolve(&self, name: &str) -> Result<String, FetchError> {
        self.base
            .join(name)
            .map(String::from)
            .map_err(|e| FetchError::InvalidUrl {
                url: name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }
}

/// HTTP(S) source backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::transport("<client>", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

struct HttpStream {
    url: String,
    response: reqwest::Response,
    total: Option<u64>,
}

#[async_trait]
impl AssetStream for HttpStream {
    fn total_len(&self) -> Option<u64> {
        self.total
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.response
            .chunk()
            .await
            .map_err(|e| FetchError::transport(&self.url, e))
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn open(&self, url: &str) -> Result<Box<dyn AssetStream>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // A zero length header is as good as none for progress purposes.
        let total = response.content_length().filter(|&len| len > 0);
        debug!("GET {} -> {} ({:?} bytes)", url, status, total);

        Ok(Box::new(HttpStream {
            url: url.to_string(),
            response,
            total,
        }))
    }
}

/// Local file source. Accepts `file://` URLs and plain paths.
#[derive(Debug, Clone)]
pub struct FileSource {
    chunk_size: usize,
}

impl FileSource {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    fn path_for(url: &str) -> Result<PathBuf, FetchError> {
        if url.starts_with("file:") {
            let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            parsed.to_file_path().map_err(|()| FetchError::InvalidUrl {
                url: url.to_string(),
                message: "not a local file URL".into(),
            })
        } else {
            Ok(PathBuf::from(url))
        }
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

struct FileStream {
    path: PathBuf,
    file: tokio::fs::File,
    total: u64,
    chunk_size: usize,
}

#[async_trait]
impl AssetStream for FileStream {
    fn total_len(&self) -> Option<u64> {
        Some(self.total).filter(|&len| len > 0)
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self
            .file
            .read(&mut buf)
            .await
            .map_err(|e| FetchError::io(self.path.display(), e))?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}

#[async_trait]
impl AssetSource for FileSource {
    async fn open(&self, url: &str) -> Result<Box<dyn AssetStream>, FetchError> {
        let path = Self::path_for(url)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| FetchError::io(path.display(), e))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| FetchError::io(path.display(), e))?
            .len();

        Ok(Box::new(FileStream {
            path,
            file,
            total,
            chunk_size: self.chunk_size,
        }))
    }
}

/// Dispatches to HTTP or file streaming by URL scheme.
#[derive(Clone)]
pub struct UrlSource {
    http: HttpSource,
    file: FileSource,
}

impl UrlSource {
    pub fn new(timeout: Duration, chunk_size: usize) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpSource::new(timeout)?,
            file: FileSource::new(chunk_size),
        })
    }
}

#[async_trait]
impl AssetSource for UrlSource {
    async fn open(&self, url: &str) -> Result<Box<dyn AssetStream>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.open(url).await
        } else {
            self.file.open(url).await
        }
    }
}
