//! Async adapters for the pseudo console's synchronous pipes.
//!
//! Anonymous pipes cannot be registered with an I/O completion port, so reads
//! run on the blocking pool. A read is started on first poll and its result is
//! parked until the next poll, which keeps reads cancel-safe.

use std::io;
use std::os::windows::io::{AsRawHandle, OwnedHandle};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use windows_sys::Win32::Foundation::{ERROR_BROKEN_PIPE, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{ReadFile, WriteFile};

const FALSE: i32 = 0;
const READ_SIZE: usize = 4096;

#[derive(Debug)]
enum PendingRead {
    Idle,
    InProgress(Option<Waker>),
    Ready(io::Result<Vec<u8>>),
}

/// Output side of a pseudo console.
#[derive(Debug)]
pub struct ConPtyReader {
    handle: Arc<OwnedHandle>,
    pending: Arc<Mutex<PendingRead>>,
    /// Bytes from a completed read that did not fit the caller's buffer.
    leftover: Vec<u8>,
}

impl ConPtyReader {
    /// Wrap the read end of the console's output pipe.
    #[must_use]
    pub fn new(handle: OwnedHandle) -> Self {
        Self {
            handle: Arc::new(handle),
            pending: Arc::new(Mutex::new(PendingRead::Idle)),
            leftover: Vec::new(),
        }
    }

    fn start_read(&self, waker: Waker) {
        let handle = Arc::clone(&self.handle);
        let pending = Arc::clone(&self.pending);
        *pending.lock().unwrap_or_else(PoisonError::into_inner) =
            PendingRead::InProgress(Some(waker));

        tokio::task::spawn_blocking(move || {
            let result = read_blocking(&handle);
            let mut state = pending.lock().unwrap_or_else(PoisonError::into_inner);
            let waker = match std::mem::replace(&mut *state, PendingRead::Ready(result)) {
                PendingRead::InProgress(waker) => waker,
                _ => None,
            };
            drop(state);
            if let Some(waker) = waker {
                waker.wake();
            }
        });
    }
}

fn read_blocking(handle: &OwnedHandle) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; READ_SIZE];
    let mut bytes_read: u32 = 0;

    // SAFETY: handle is a valid pipe end and the buffer outlives the call.
    let success = unsafe {
        ReadFile(
            handle.as_raw_handle() as HANDLE,
            buffer.as_mut_ptr(),
            buffer.len() as u32,
            &mut bytes_read,
            std::ptr::null_mut(),
        )
    };

    if success == FALSE {
        let err = io::Error::last_os_error();
        // The console closed its end.
        if err.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) {
            return Ok(Vec::new());
        }
        return Err(err);
    }

    buffer.truncate(bytes_read as usize);
    Ok(buffer)
}

fn copy_out(data: &[u8], buf: &mut ReadBuf<'_>) -> usize {
    let n = data.len().min(buf.remaining());
    buf.put_slice(&data[..n]);
    n
}

impl AsyncRead for ConPtyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.leftover.is_empty() {
            let n = copy_out(&this.leftover, buf);
            this.leftover.drain(..n);
            return Poll::Ready(Ok(()));
        }

        let mut state = this.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, PendingRead::Idle) {
            PendingRead::Idle => {
                drop(state);
                this.start_read(cx.waker().clone());
                Poll::Pending
            }
            PendingRead::InProgress(_) => {
                *state = PendingRead::InProgress(Some(cx.waker().clone()));
                Poll::Pending
            }
            PendingRead::Ready(Ok(data)) => {
                drop(state);
                let n = copy_out(&data, buf);
                this.leftover.extend_from_slice(&data[n..]);
                Poll::Ready(Ok(()))
            }
            PendingRead::Ready(Err(e)) => Poll::Ready(Err(e)),
        }
    }
}

/// Input side of a pseudo console.
#[derive(Debug)]
pub struct ConPtyWriter {
    handle: OwnedHandle,
}

impl ConPtyWriter {
    /// Wrap the write end of the console's input pipe.
    #[must_use]
    pub const fn new(handle: OwnedHandle) -> Self {
        Self { handle }
    }
}

impl AsyncWrite for ConPtyWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut bytes_written: u32 = 0;

        // SAFETY: handle is a valid pipe end and buf is valid for reads.
        let success = unsafe {
            WriteFile(
                self.handle.as_raw_handle() as HANDLE,
                buf.as_ptr(),
                buf.len() as u32,
                &mut bytes_written,
                std::ptr::null_mut(),
            )
        };

        if success == FALSE {
            Poll::Ready(Err(io::Error::last_os_error()))
        } else {
            Poll::Ready(Ok(bytes_written as usize))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
