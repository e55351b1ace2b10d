//! Unix PTY allocation and the async master handle.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::{Errno, FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result};
use crate::traits::Resize;

fn create_error(errno: Errno) -> PtyError {
    PtyError::Create(io::Error::from_raw_os_error(errno.raw_os_error()))
}

/// Master side of a Unix pseudo-terminal.
///
/// Clones share the same descriptor, so one clone can sit in a reader task
/// while another writes and resizes. The descriptor closes when the last
/// clone is dropped.
#[derive(Clone)]
pub struct UnixPtyMaster {
    async_fd: Arc<AsyncFd<OwnedFd>>,
    open: Arc<AtomicBool>,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.async_fd.as_raw_fd())
            .field("open", &self.open.load(Ordering::SeqCst))
            .finish()
    }
}

impl UnixPtyMaster {
    /// Allocate a new PTY pair, returning the master and the slave's path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open() -> Result<(Self, String)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY).map_err(create_error)?;
        fcntl_setfd(&master_fd, FdFlags::CLOEXEC).map_err(create_error)?;
        grantpt(&master_fd).map_err(create_error)?;
        unlockpt(&master_fd).map_err(create_error)?;

        let slave_name = ptsname(&master_fd, Vec::new()).map_err(create_error)?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(create_error)?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                async_fd: Arc::new(async_fd),
                open: Arc::new(AtomicBool::new(true)),
            },
            slave_path,
        ))
    }

    /// Check if the master is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Set the window size; the foreground process group gets `SIGWINCH`.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }

        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| PtyError::Resize(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Get the current window size.
    pub fn window_size(&self) -> Result<WindowSize> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }

        let winsize = tcgetwinsize(self.async_fd.get_ref())?;
        Ok(WindowSize::new(winsize.ws_col, winsize.ws_row))
    }

    /// Mark every clone closed: reads return EOF and writes fail.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl Resize for UnixPtyMaster {
    fn resize(&self, size: WindowSize) -> Result<()> {
        self.set_window_size(size)
    }
}

impl AsyncRead for UnixPtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.is_open() {
            return Poll::Ready(Ok(()));
        }

        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Linux reports a hung-up slave as EIO rather than EOF.
                Err(Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }
}

impl AsyncWrite for UnixPtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if !self.is_open() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed")));
        }

        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.close();
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY.
///
/// The descriptor is close-on-exec; the child receives it only through its
/// standard streams.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    open(
        Path::new(path),
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(create_error)
}
