//! The reader worker: one task per running session.
//!
//! The worker owns the output side of the channel. It turns reads into
//! `Output` events and ends the session with exactly one `Exited` or `Failed`
//! when output ends or the read path breaks. A stop request ends it without a
//! terminal event; `Session::stop` then finishes the session itself.

use std::sync::Arc;
use std::time::Duration;

use autoprompt_pty::{ChannelReader, ChildHandle, ExitStatus, PtyChild, ReadChunk};
use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::Instant;

use super::controller::Shared;
use super::state::SessionState;

/// Reads drained after the child exits wait at most this long each.
const DRAIN_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy)]
pub(super) struct WorkerConfig {
    pub(super) poll_interval: Duration,
    pub(super) exit_wait: Duration,
}

pub(super) async fn run(
    mut reader: ChannelReader,
    child: ChildHandle,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    config: WorkerConfig,
) {
    tracing::debug!("reader worker started");

    let terminal = loop {
        let chunk = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                tracing::debug!("reader worker stopping on request");
                return;
            }
            chunk = reader.read_chunk(config.poll_interval) => chunk,
        };

        match chunk {
            Ok(ReadChunk::Data(data)) => {
                tracing::trace!(bytes = data.len(), "session output");
                if !shared.emit_output(Bytes::from(data)) {
                    return;
                }
            }
            Ok(ReadChunk::Idle) => {
                if child_exited(&child).await {
                    tracing::debug!("child exited without closing its output");
                    drain(&mut reader, &shared, config.exit_wait).await;
                    break reap(&child, config.exit_wait).await;
                }
            }
            Ok(ReadChunk::Eof) => {
                tracing::debug!("session output closed");
                break reap(&child, config.exit_wait).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "session read failed");
                let mut child = child.lock().await;
                if let Err(kill_err) = child.kill() {
                    tracing::warn!(error = %kill_err, "failed to kill child after read error");
                }
                break SessionState::Failed(format!("read error: {e}"));
            }
        }
    };

    tracing::debug!(state = %terminal, "reader worker finished");
    shared.finish(terminal);
}

async fn child_exited(child: &ChildHandle) -> bool {
    match child.lock().await.try_wait() {
        Ok(status) => status.is_some(),
        Err(e) => {
            tracing::debug!(error = %e, "polling child status failed");
            false
        }
    }
}

/// Forward output still buffered after the child exited.
async fn drain(reader: &mut ChannelReader, shared: &Shared, budget: Duration) {
    let deadline = Instant::now() + budget;
    while Instant::now() < deadline {
        match reader.read_chunk(DRAIN_POLL).await {
            Ok(ReadChunk::Data(data)) => {
                if !shared.emit_output(Bytes::from(data)) {
                    return;
                }
            }
            Ok(ReadChunk::Idle | ReadChunk::Eof) => return,
            Err(e) => {
                tracing::debug!(error = %e, "read failed while draining");
                return;
            }
        }
    }
}

/// Wait for a child whose output has ended.
async fn reap(child: &ChildHandle, exit_wait: Duration) -> SessionState {
    let mut child = child.lock().await;
    let waited = tokio::time::timeout(exit_wait, child.wait()).await;
    match waited {
        Ok(Ok(status)) => SessionState::Exited(status.exit_code()),
        Ok(Err(e)) => SessionState::Failed(format!("failed to reap child: {e}")),
        Err(_) => {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to kill unresponsive child");
            }
            SessionState::Failed(format!(
                "child did not exit within {}ms after its output closed",
                exit_wait.as_millis()
            ))
        }
    }
}

/// Kill the child unless it already exited, then reap it.
pub(super) async fn kill_and_reap(
    child: &mut dyn PtyChild,
    exit_wait: Duration,
) -> Result<ExitStatus, String> {
    match child.try_wait() {
        Ok(Some(status)) => return Ok(status),
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "polling child status failed"),
    }

    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "failed to kill child");
    }

    match tokio::time::timeout(exit_wait, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(format!("failed to reap child: {e}")),
        Err(_) => Err(format!(
            "child did not exit within {}ms of being killed",
            exit_wait.as_millis()
        )),
    }
}
