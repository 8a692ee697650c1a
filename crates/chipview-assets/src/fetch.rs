use tracing::debug;

use crate::error::FetchError;
use crate::progress::Progress;
use crate::source::AssetSource;

/// Largest up-front allocation trusted from an announced length.
const MAX_PREALLOC: u64 = 512 * 1024 * 1024;

/// The undecoded asset bytes, alive only between download and parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAsset {
    bytes: Vec<u8>,
}

impl RawAsset {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Stream `url` from `source` into memory, reporting progress after every
/// chunk and yielding to the scheduler between chunks.
///
/// No retry is attempted; any transport failure ends the fetch.
pub async fn fetch_asset<F>(
    source: &dyn AssetSource,
    url: &str,
    mut on_progress: F,
) -> Result<RawAsset, FetchError>
where
    F: FnMut(Progress) + Send,
{
    let mut stream = source.open(url).await?;
    let total = stream.total_len();
    let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
    let mut received = 0u64;

    while let Some(chunk) = stream.next_chunk().await? {
        received += chunk.len() as u64;
        bytes.extend_from_slice(&chunk);
        on_progress(Progress { received, total });
        tokio::task::yield_now().await;
    }

    if let Some(expected) = total {
        if received < expected {
            return Err(FetchError::Incomplete {
                url: url.to_string(),
                received,
                expected,
            });
        }
    }

    debug!("Fetched '{}': {} bytes", url, received);
    Ok(RawAsset { bytes })
}
