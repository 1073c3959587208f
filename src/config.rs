use std::time::Duration;

use serde::Deserialize;

/// Default read size: 2 MiB per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Tunables for serving downloads.
///
/// Every field has a default, so a partial config (or none) deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Bytes read from the source per body chunk.
    pub chunk_size: usize,
    /// Pause after each chunk, in milliseconds. `0` disables throttling.
    pub throttle_delay_ms: u64,
    /// `Cache-Control` sent with 200, 206 and 304 responses.
    pub cache_control: String,
    /// Media type used when none is set on the download.
    pub default_content_type: String,
    pub boundary_prefix: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            throttle_delay_ms: 0,
            cache_control: "public".to_string(),
            default_content_type: "application/octet-stream".to_string(),
            boundary_prefix: "DOWNLOAD_BOUNDARY".to_string(),
        }
    }
}

impl DownloadConfig {
    /// Chunk size, never zero.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub fn throttle_delay(&self) -> Option<Duration> {
        match self.throttle_delay_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_throttle(mut self, delay: Duration) -> Self {
        self.throttle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
