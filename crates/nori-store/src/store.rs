//! Append-only record store over a single file handle.
//!
//! Appends go through an in-memory write buffer; reads flush that buffer and
//! then perform positioned reads against the handle. Every operation runs
//! under one mutex, so a read always observes all appends that completed
//! before it.

use crate::frame::{self, LEN_WIDTH};
use bytes::Bytes;
use std::io::{self, ErrorKind, SeekFrom};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufWriter,
};
use tokio::sync::Mutex;
use tracing::{debug, trace};

const DEFAULT_BUFFER_CAPACITY: usize = 4096;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Store is closed")]
    Closed,
}

/// Configuration for store behavior.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the write buffer in bytes. Frames at least this large
    /// bypass the buffer and go straight to the handle.
    pub buffer_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// The open half of a store: buffered handle plus logical end-of-file.
struct StoreFile<F> {
    writer: BufWriter<F>,
    size: u64,
}

/// Append-only record store.
///
/// Records are framed with an 8-byte big-endian length prefix and addressed
/// by the byte offset of that prefix. The caller owns the mapping from
/// logical identifiers to positions.
///
/// # Example
///
/// ```no_run
/// use nori_store::Store;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let file = tokio::fs::OpenOptions::new()
///         .read(true)
///         .write(true)
///         .create(true)
///         .open("records.store")
///         .await?;
///     let store = Store::new(file).await?;
///
///     let (_n, pos) = store.append(b"hello").await?;
///     assert_eq!(&store.read(pos).await?[..], b"hello");
///
///     store.close().await?;
///     Ok(())
/// }
/// ```
pub struct Store<F = File> {
    inner: Mutex<Option<StoreFile<F>>>,
}

impl<F> Store<F>
where
    F: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send,
{
    /// Creates a store over an already-open handle with the default config.
    pub async fn new(file: F) -> Result<Self, StoreError> {
        Self::with_config(file, StoreConfig::default()).await
    }

    /// Creates a store over an already-open handle.
    ///
    /// The handle may already contain frames; appending resumes at its
    /// current end.
    pub async fn with_config(mut file: F, config: StoreConfig) -> Result<Self, StoreError> {
        // Seeking to the end both sizes the file and parks the write cursor there.
        let size = file.seek(SeekFrom::End(0)).await?;

        debug!(size, capacity = config.buffer_capacity, "opened record store");

        Ok(Self {
            inner: Mutex::new(Some(StoreFile {
                writer: BufWriter::with_capacity(config.buffer_capacity, file),
                size,
            })),
        })
    }

    /// Appends a record to the store.
    ///
    /// Returns `(n, pos)`: the total frame size written, length prefix
    /// included, and the offset the frame starts at. The frame may still be
    /// sitting in the write buffer when this returns.
    pub async fn append(&self, record: &[u8]) -> Result<(u64, u64), StoreError> {
        let mut guard = self.inner.lock().await;
        let file = guard.as_mut().ok_or(StoreError::Closed)?;

        let encoded = frame::encode(record);
        let pos = file.size;

        if let Err(err) = file.writer.write_all(&encoded).await {
            // A partial frame may have reached the handle. Track the true end
            // so later frames still start where `size` says they do. If the
            // position itself can't be queried, `size` keeps its pre-append
            // value and any bytes that did land sit unaccounted before it.
            if let Ok(end) = file.writer.get_mut().stream_position().await {
                file.size = end + file.writer.buffer().len() as u64;
            }
            return Err(err.into());
        }

        let n = frame::frame_len(record.len());
        file.size += n;

        trace!(pos, n, "appended record");
        Ok((n, pos))
    }

    /// Reads the record whose frame starts at `pos`.
    ///
    /// Positions past the end of the store, or frames whose length runs past
    /// it, fail with [`ErrorKind::UnexpectedEof`].
    pub async fn read(&self, pos: u64) -> Result<Bytes, StoreError> {
        let mut guard = self.inner.lock().await;
        let file = guard.as_mut().ok_or(StoreError::Closed)?;

        file.writer.flush().await?;

        let size = file.size;
        let handle = file.writer.get_mut();
        let result = read_frame(handle, pos, size).await;
        handle.seek(SeekFrom::Start(size)).await?;

        let record = result?;
        trace!(pos, len = record.len(), "read record");
        Ok(record)
    }

    /// Reads raw bytes starting at `pos`, ignoring frame boundaries.
    ///
    /// Returns the number of bytes read, which is short only at end-of-file.
    pub async fn read_at(&self, buf: &mut [u8], pos: u64) -> Result<usize, StoreError> {
        let mut guard = self.inner.lock().await;
        let file = guard.as_mut().ok_or(StoreError::Closed)?;

        file.writer.flush().await?;

        if pos >= file.size {
            return Ok(0);
        }

        let size = file.size;
        let handle = file.writer.get_mut();
        let result = read_full_at(handle, buf, pos).await;
        handle.seek(SeekFrom::Start(size)).await?;

        Ok(result?)
    }

    /// Returns the logical size of the store, buffered frames included.
    pub async fn size(&self) -> Result<u64, StoreError> {
        let guard = self.inner.lock().await;
        guard
            .as_ref()
            .map(|file| file.size)
            .ok_or(StoreError::Closed)
    }

    /// Flushes buffered frames and closes the handle.
    ///
    /// The store is closed afterwards even if the flush fails; every later
    /// call returns [`StoreError::Closed`].
    ///
    /// Errors from the handle's `shutdown` are returned. For
    /// [`tokio::fs::File`] that is only a flush: the descriptor is released
    /// when the handle drops, so an error from the OS close itself is not
    /// observable here.
    pub async fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        let mut file = guard.take().ok_or(StoreError::Closed)?;

        file.writer.flush().await?;
        file.writer.into_inner().shutdown().await?;

        debug!(size = file.size, "closed record store");
        Ok(())
    }
}

fn past_end(pos: u64) -> io::Error {
    io::Error::new(
        ErrorKind::UnexpectedEof,
        format!("frame at {pos} extends past end of store"),
    )
}

/// Reads one frame at `pos`, bounds-checked against `size` before any
/// payload buffer is allocated.
async fn read_frame<F>(handle: &mut F, pos: u64, size: u64) -> io::Result<Bytes>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    let payload_start = pos
        .checked_add(LEN_WIDTH as u64)
        .filter(|end| *end <= size)
        .ok_or_else(|| past_end(pos))?;

    handle.seek(SeekFrom::Start(pos)).await?;

    let mut prefix = [0u8; LEN_WIDTH];
    handle.read_exact(&mut prefix).await?;
    let len = frame::decode_len(prefix);

    payload_start
        .checked_add(len)
        .filter(|end| *end <= size)
        .ok_or_else(|| past_end(pos))?;
    let len = usize::try_from(len).map_err(|_| past_end(pos))?;

    let mut record = vec![0u8; len];
    handle.read_exact(&mut record).await?;

    Ok(Bytes::from(record))
}

async fn read_full_at<F>(handle: &mut F, buf: &mut [u8], pos: u64) -> io::Result<usize>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    handle.seek(SeekFrom::Start(pos)).await?;

    let mut filled = 0;
    while filled < buf.len() {
        match handle.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
