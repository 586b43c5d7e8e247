//! Ordered, paced delivery over an unacknowledged write channel.
//!
//! The printer never acknowledges anything and silently drops bytes when its
//! buffer overflows, so chunks go out strictly one after another with an
//! optional pause in between. The first failed write aborts the transfer.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{Error, Result};

/// Link MTU-driven chunk size of the reference printer.
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// Write-only link to a printer.
///
/// Implement this for a BLE characteristic or a mock.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Hands `data` to the link. Returning `Ok` means queued, not received.
    async fn write_without_response(&mut self, data: &[u8]) -> Result<()>;

    async fn is_connected(&self) -> bool;

    /// Releases the link. Called once, after the last write.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Box<C> {
    async fn write_without_response(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_without_response(data).await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on a single write.
    pub chunk_size: usize,
    /// Pause between consecutive writes. Zero disables pacing.
    pub chunk_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        Ok(())
    }
}

/// What a completed transfer pushed through the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes_sent: usize,
    pub chunks: usize,
}

/// Splits data into ordered chunks of at most `chunk_size` bytes.
/// - data: full payload
/// - chunk_size: max bytes per chunk; 0 yields the whole payload as one chunk
pub fn chunk_data(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if chunk_size == 0 {
        return vec![data];
    }
    data.chunks(chunk_size).collect()
}

/// Sends `data` chunk by chunk, waiting for each write before the next.
///
/// Stops at the first failed write or lost connection and reports the number
/// of bytes already handed to the link as `TransportFailure { offset }`.
/// Nothing is retried.
///
/// - channel: open link; it is left open either way
/// - data: the framed job
/// - config: chunk size and inter-chunk delay
pub async fn send_chunked<C: Channel + ?Sized>(
    channel: &mut C,
    data: &[u8],
    config: &TransportConfig,
) -> Result<TransferReport> {
    config.validate()?;
    let total = data.len();
    let mut offset = 0;
    let mut chunks = 0;

    for chunk in chunk_data(data, config.chunk_size) {
        if chunks > 0 && !config.chunk_delay.is_zero() {
            tokio::time::sleep(config.chunk_delay).await;
        }
        if !channel.is_connected().await {
            warn!("channel disconnected at {}/{} bytes", offset, total);
            return Err(Error::TransportFailure {
                offset,
                reason: "channel disconnected".into(),
            });
        }
        if let Err(err) = channel.write_without_response(chunk).await {
            warn!("write failed at {}/{} bytes: {}", offset, total, err);
            return Err(Error::TransportFailure {
                offset,
                reason: err.to_string(),
            });
        }
        offset += chunk.len();
        chunks += 1;
        debug!("chunk {} sent ({} bytes, {}/{})", chunks, chunk.len(), offset, total);
    }

    Ok(TransferReport {
        bytes_sent: offset,
        chunks,
    })
}
