//! Single-concurrency FIFO over outbound writes, chunked to work around
//! transports that drop bytes on large writes.

use crate::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Default write chunk size (64 KiB). Configurable; the protocol places no
/// requirement on a specific value.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Guards the swappable write half and serializes writers.
///
/// `tokio::sync::Mutex` grants the lock in the order it was requested, which
/// is exactly the FIFO, concurrency-1 guarantee the write queue needs: a
/// caller that wins the lock holds it across the whole chunked write, so the
/// next writer in line can't start until this one's write (success or
/// failure) has completed. Reopening the port swaps the `Option` under the
/// same lock, so no writer ever observes a half-closed connection mid-write.
pub struct WriteQueue<W> {
    slot: Mutex<Option<W>>,
}

impl<W: AsyncWrite + Unpin> WriteQueue<W> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Installs (or clears, on `None`) the current write half. Called once on
    /// open, swapped on every successful reopen, cleared on close.
    pub async fn set(&self, writer: Option<W>) {
        *self.slot.lock().await = writer;
    }

    /// Writes `buf` in chunks of at most `chunk_size` bytes, draining after
    /// each chunk. Held for the duration of the whole operation, so this is
    /// the one item in the queue's FIFO at any instant.
    pub async fn write_chunked(&self, buf: &[u8], chunk_size: usize) -> Result<(), Error> {
        let mut guard = self.slot.lock().await;
        let writer = guard.as_mut().ok_or(Error::Closed)?;

        let chunk_size = chunk_size.max(1);
        let mut from = 0;
        while from < buf.len() {
            let to = (from + chunk_size).min(buf.len());
            writer.write_all(&buf[from..to]).await?;
            writer.flush().await?; // drain
            from = to;
        }
        if buf.is_empty() {
            // Still perform a flush for a zero-length frame (shouldn't
            // normally happen: a frame is always at least HEADER_LEN bytes).
            writer.flush().await?;
        }
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin> Default for WriteQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}
