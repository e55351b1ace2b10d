//! Pipe-based fallback strategy.
//!
//! The child gets plain pipes: one for stdin and two for stdout/stderr, which
//! are merged into a single output stream. There is no terminal, so resize is
//! not available and programs that check `isatty` behave differently.

use std::ffi::{OsStr, OsString};
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{ChildStderr, ChildStdout, Command};

use crate::backend::BackendKind;
use crate::channel::{Channel, ChannelReader, ChannelWriter};
use crate::config::PtyConfig;
use crate::error::{PtyError, Result};
use crate::process::ProcessChild;

/// Spawn `program` behind pipes.
pub(crate) fn spawn(program: &OsStr, args: &[OsString], config: &PtyConfig) -> Result<Channel> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(PtyError::Spawn)?;

    let missing = |name| PtyError::Spawn(io::Error::other(format!("child {name} was not captured")));
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    Ok(Channel::new(
        BackendKind::Pipe,
        ChannelReader::new(Box::new(MergedOutput::new(stdout, stderr))),
        ChannelWriter::new(Box::new(stdin), None, config.window_size),
        Box::new(ProcessChild::new(child, cfg!(unix))),
    ))
}

/// Interleaves a child's stdout and stderr into one byte stream.
///
/// Reports EOF only once both streams have ended. Each stream's own byte
/// order is preserved.
#[derive(Debug)]
pub struct MergedOutput<O = ChildStdout, E = ChildStderr> {
    stdout: Option<O>,
    stderr: Option<E>,
    stderr_first: bool,
}

impl<O, E> MergedOutput<O, E> {
    /// Merge two streams.
    pub const fn new(stdout: O, stderr: E) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
            stderr_first: false,
        }
    }
}

/// Poll one optional stream. Returns `Some(result)` when it produced data or
/// an error, and clears the slot when it reached EOF.
fn poll_slot<R: AsyncRead + Unpin>(
    slot: &mut Option<R>,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
) -> Option<Poll<io::Result<()>>> {
    let reader = slot.as_mut()?;
    let before = buf.filled().len();
    match Pin::new(reader).poll_read(cx, buf) {
        Poll::Ready(Ok(())) if buf.filled().len() == before => {
            *slot = None;
            None
        }
        other => Some(other),
    }
}

impl<O, E> AsyncRead for MergedOutput<O, E>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        // Alternate which stream is polled first so neither starves.
        this.stderr_first = !this.stderr_first;

        let mut pending = false;
        for take_stderr in [this.stderr_first, !this.stderr_first] {
            let polled = if take_stderr {
                poll_slot(&mut this.stderr, cx, buf)
            } else {
                poll_slot(&mut this.stdout, cx, buf)
            };
            match polled {
                Some(Poll::Pending) => pending = true,
                Some(ready) => return ready,
                None => {}
            }
        }

        if pending || this.stdout.is_some() || this.stderr.is_some() {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn merged_output_reads_both_streams_until_both_close() {
        let (mut out_tx, out_rx) = tokio::io::duplex(64);
        let (mut err_tx, err_rx) = tokio::io::duplex(64);
        let mut merged = MergedOutput::new(out_rx, err_rx);

        out_tx.write_all(b"out").await.unwrap();
        drop(out_tx);
        err_tx.write_all(b"err").await.unwrap();
        drop(err_tx);

        let mut collected = Vec::new();
        merged.read_to_end(&mut collected).await.unwrap();
        collected.sort_unstable();
        let mut expected = b"outerr".to_vec();
        expected.sort_unstable();
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn merged_output_waits_for_open_stream() {
        let (out_tx, out_rx) = tokio::io::duplex(64);
        let (mut err_tx, err_rx) = tokio::io::duplex(64);
        let mut merged = MergedOutput::new(out_rx, err_rx);
        drop(out_tx);

        let mut buf = [0u8; 16];
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), merged.read(&mut buf)).await;
        assert!(pending.is_err(), "stderr is still open, read must not report EOF");

        err_tx.write_all(b"late").await.unwrap();
        let n = merged.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"late");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipe_channel_echoes_stdin() {
        let mut channel = spawn(OsStr::new("cat"), &[], &PtyConfig::default()).unwrap();
        assert_eq!(channel.backend(), BackendKind::Pipe);
        assert!(!channel.supports_resize());
        assert_eq!(
            channel.resize(120, 40).unwrap(),
            crate::channel::ResizeOutcome::Unsupported
        );

        channel.write(b"ping\n").await.unwrap();
        let chunk = channel
            .read_chunk(std::time::Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(chunk, crate::channel::ReadChunk::Data(b"ping\n".to_vec()));
        channel.close().await.unwrap();
    }
}
