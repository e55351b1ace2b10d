//! The bidirectional byte channel produced by a spawn strategy.
//!
//! A [`Channel`] bundles the child's output stream, its input stream, an
//! optional resize capability and the child's lifecycle handle. It can be used
//! directly, or [split](Channel::split) so that a dedicated reader task owns the
//! output side while other callers keep the write and lifecycle sides.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::backend::BackendKind;
use crate::config::WindowSize;
use crate::error::{PtyError, Result};
use crate::traits::{PtyChild, Resize};

/// Maximum bytes returned by a single [`ChannelReader::read_chunk`].
pub const READ_CHUNK_SIZE: usize = 4096;

/// Boxed output stream of a child.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed input stream of a child.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared lifecycle handle for a channel's child process.
pub type ChildHandle = Arc<tokio::sync::Mutex<Box<dyn PtyChild>>>;

/// Result of one bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    /// Between 1 and [`READ_CHUNK_SIZE`] bytes of output, in order.
    Data(Vec<u8>),
    /// Nothing arrived before the timeout.
    Idle,
    /// The child closed its side; no more output will arrive.
    Eof,
}

/// Outcome of a resize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The terminal now has the requested geometry.
    Applied,
    /// The backend has no terminal to resize; nothing happened.
    Unsupported,
}

/// Output side of a channel.
pub struct ChannelReader {
    inner: BoxedReader,
    buf: Box<[u8]>,
}

impl fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReader")
            .field("buf_len", &self.buf.len())
            .finish_non_exhaustive()
    }
}

impl ChannelReader {
    /// Wrap an output stream.
    #[must_use]
    pub fn new(inner: BoxedReader) -> Self {
        Self {
            inner,
            buf: vec![0; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Read whatever output is available, waiting at most `timeout`.
    ///
    /// Cancel-safe: if the returned future is dropped before completion no
    /// output is lost.
    pub async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadChunk> {
        match tokio::time::timeout(timeout, self.inner.read(&mut self.buf)).await {
            Err(_elapsed) => Ok(ReadChunk::Idle),
            Ok(Ok(0)) => Ok(ReadChunk::Eof),
            Ok(Ok(n)) => Ok(ReadChunk::Data(self.buf[..n].to_vec())),
            Ok(Err(e)) => Err(PtyError::Io(e)),
        }
    }
}

/// Input and control side of a channel.
pub struct ChannelWriter {
    inner: BoxedWriter,
    resizer: Option<Box<dyn Resize>>,
    size: WindowSize,
    closed: bool,
}

impl fmt::Debug for ChannelWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWriter")
            .field("resizable", &self.resizer.is_some())
            .field("size", &self.size)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ChannelWriter {
    /// Wrap an input stream, with an optional resize capability.
    #[must_use]
    pub fn new(inner: BoxedWriter, resizer: Option<Box<dyn Resize>>, size: WindowSize) -> Self {
        Self {
            inner,
            resizer,
            size,
            closed: false,
        }
    }

    /// Whether [`resize`](Self::resize) can have any effect.
    #[must_use]
    pub fn supports_resize(&self) -> bool {
        self.resizer.is_some()
    }

    /// The last geometry applied (or requested at spawn).
    #[must_use]
    pub const fn window_size(&self) -> WindowSize {
        self.size
    }

    /// Write all of `data` to the child and flush it.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Resize the terminal.
    ///
    /// Backends without a terminal report [`ResizeOutcome::Unsupported`]
    /// instead of failing.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<ResizeOutcome> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        let size = WindowSize::checked(cols, rows)?;
        let Some(resizer) = &self.resizer else {
            return Ok(ResizeOutcome::Unsupported);
        };
        resizer.resize(size)?;
        self.size = size;
        Ok(ResizeOutcome::Applied)
    }

    /// Close the input side. Further writes fail with [`PtyError::Closed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.resizer = None;
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// A spawned child behind a bidirectional byte pipe.
pub struct Channel {
    backend: BackendKind,
    pid: Option<u32>,
    reader: ChannelReader,
    writer: ChannelWriter,
    child: ChildHandle,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("backend", &self.backend)
            .field("pid", &self.pid)
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Assemble a channel from its parts.
    #[must_use]
    pub fn new(
        backend: BackendKind,
        reader: ChannelReader,
        writer: ChannelWriter,
        child: Box<dyn PtyChild>,
    ) -> Self {
        Self {
            backend,
            pid: child.pid(),
            reader,
            writer,
            child: Arc::new(tokio::sync::Mutex::new(child)),
        }
    }

    /// The strategy that produced this channel.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Whether [`resize`](Self::resize) can have any effect.
    #[must_use]
    pub fn supports_resize(&self) -> bool {
        self.writer.supports_resize()
    }

    /// Process ID of the child, if it is known.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// See [`ChannelReader::read_chunk`].
    pub async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadChunk> {
        self.reader.read_chunk(timeout).await
    }

    /// See [`ChannelWriter::write`].
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write(data).await
    }

    /// See [`ChannelWriter::resize`].
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<ResizeOutcome> {
        self.writer.resize(cols, rows)
    }

    /// Kill the child, close the input side and reap the child.
    pub async fn close(mut self) -> Result<()> {
        let mut child = self.child.lock().await;
        child.kill()?;
        self.writer.close().await?;
        child.wait().await?;
        Ok(())
    }

    /// Split into independently owned reader, writer and lifecycle parts.
    #[must_use]
    pub fn split(self) -> (ChannelReader, ChannelWriter, ChildHandle) {
        (self.reader, self.writer, self.child)
    }
}
