//! Tests for session failure paths, driven by a scripted spawn strategy.
//!
//! The scripted channel lets a test decide exactly when reads fail, when
//! writes fail and how the child reacts to being killed.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use autoprompt::pty::backend::SpawnFuture;
use autoprompt::pty::{
    BackendKind, BackendSelector, Channel, ChannelReader, ChannelWriter, ExitStatus, PtyChild,
    PtyConfig, PtyError, SpawnStrategy, WindowSize,
};
use autoprompt::{Session, SessionConfig, SessionError, SessionEvent, SessionState};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc::UnboundedReceiver;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Output stream that replays a fixed script, then stays silent.
///
/// An empty `Ok` step reads as end of output.
struct ScriptedOutput(VecDeque<io::Result<Vec<u8>>>);

impl AsyncRead for ScriptedOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.0.pop_front() {
            Some(Ok(data)) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            }
            Some(Err(e)) => Poll::Ready(Err(e)),
            // The read timeout wakes the worker.
            None => Poll::Pending,
        }
    }
}

/// Input stream that accepts everything, or rejects every write.
struct Input {
    broken: bool,
}

impl AsyncWrite for Input {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.broken {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "input closed")))
        } else {
            Poll::Ready(Ok(buf.len()))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A child that runs until killed, then reports 137.
struct Child {
    killed: Arc<AtomicBool>,
}

impl PtyChild for Child {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = autoprompt::pty::Result<ExitStatus>> + Send + '_>> {
        let killed = self.killed.load(Ordering::SeqCst);
        Box::pin(async move {
            if !killed {
                std::future::pending::<()>().await;
            }
            Ok(ExitStatus::Exited(137))
        })
    }

    fn try_wait(&mut self) -> autoprompt::pty::Result<Option<ExitStatus>> {
        Ok(self
            .killed
            .load(Ordering::SeqCst)
            .then_some(ExitStatus::Exited(137)))
    }

    fn kill(&mut self) -> autoprompt::pty::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one prepared channel.
struct Scripted {
    channel: Mutex<Option<Channel>>,
}

impl Scripted {
    fn new(output: Vec<io::Result<Vec<u8>>>, broken_input: bool, child: Box<dyn PtyChild>) -> Self {
        let channel = Channel::new(
            BackendKind::Pipe,
            ChannelReader::new(Box::new(ScriptedOutput(output.into()))),
            ChannelWriter::new(Box::new(Input { broken: broken_input }), None, WindowSize::default()),
            child,
        );
        Self {
            channel: Mutex::new(Some(channel)),
        }
    }
}

impl SpawnStrategy for Scripted {
    fn kind(&self) -> BackendKind {
        BackendKind::Pipe
    }

    fn spawn<'a>(
        &'a self,
        _program: &'a OsStr,
        _args: &'a [OsString],
        _config: &'a PtyConfig,
    ) -> SpawnFuture<'a> {
        let channel = self.channel.lock().ok().and_then(|mut slot| slot.take());
        Box::pin(async move { channel.ok_or(PtyError::Closed) })
    }
}

fn session_with(strategy: Scripted) -> Session {
    let config = SessionConfig::new()
        .poll_interval(Duration::from_millis(10))
        .exit_wait(Duration::from_millis(500));
    Session::with_selector(config, BackendSelector::with_strategies(vec![Box::new(strategy)]))
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no event in time")
        .expect("event channel closed")
}

/// A read error kills the child and fails the session with one terminal event.
#[tokio::test]
async fn read_error_fails_session() {
    let killed = Arc::new(AtomicBool::new(false));
    let strategy = Scripted::new(
        vec![Ok(b"data".to_vec()), Err(io::Error::other("device gone"))],
        false,
        Box::new(Child {
            killed: Arc::clone(&killed),
        }),
    );
    let mut session = session_with(strategy);
    let mut events = session.events().unwrap();
    session.start("scripted", Vec::<String>::new()).await.unwrap();

    assert_eq!(next_event(&mut events).await, SessionEvent::Output(b"data"[..].into()));
    let SessionEvent::Failed(reason) = next_event(&mut events).await else {
        panic!("expected a Failed event");
    };
    assert!(reason.contains("device gone"), "reason: {reason}");
    assert!(killed.load(Ordering::SeqCst));
    assert!(matches!(session.state(), SessionState::Failed(_)));

    // Stopping afterwards adds nothing.
    assert!(matches!(session.stop().await, SessionState::Failed(_)));
    assert!(events.try_recv().is_err());
}

/// A failed write is reported as an error event and the session keeps running.
#[tokio::test]
async fn write_error_keeps_session_running() {
    let killed = Arc::new(AtomicBool::new(false));
    let strategy = Scripted::new(
        Vec::new(),
        true,
        Box::new(Child {
            killed: Arc::clone(&killed),
        }),
    );
    let mut session = session_with(strategy);
    let mut events = session.events().unwrap();
    session.start("scripted", Vec::<String>::new()).await.unwrap();

    let err = session.write(b"hello\n").await.unwrap_err();
    assert!(matches!(err, SessionError::Channel(PtyError::Io(_))), "error: {err:?}");
    let SessionEvent::Error(message) = next_event(&mut events).await else {
        panic!("expected an Error event");
    };
    assert!(message.starts_with("write failed"), "message: {message}");
    assert_eq!(session.state(), SessionState::Running);
    assert!(!killed.load(Ordering::SeqCst));

    // The next failure is reported the same way.
    assert!(session.write(b"again\n").await.is_err());
    assert!(matches!(next_event(&mut events).await, SessionEvent::Error(_)));
    assert_eq!(session.state(), SessionState::Running);

    assert_eq!(session.stop().await, SessionState::Exited(137));
    assert!(killed.load(Ordering::SeqCst));
    assert_eq!(next_event(&mut events).await, SessionEvent::Exited(137));
}

#[cfg(unix)]
mod drop_while_reaping {
    use tokio::process::Command;
    use tokio::sync::Notify;

    use super::*;

    /// A child whose reap never finishes; it stands for a real process group.
    struct Unreaped {
        pgid: u32,
        waiting: Arc<Notify>,
    }

    impl PtyChild for Unreaped {
        fn pid(&self) -> Option<u32> {
            Some(self.pgid)
        }

        fn wait(&mut self) -> Pin<Box<dyn Future<Output = autoprompt::pty::Result<ExitStatus>> + Send + '_>> {
            self.waiting.notify_one();
            Box::pin(std::future::pending())
        }

        fn try_wait(&mut self) -> autoprompt::pty::Result<Option<ExitStatus>> {
            Ok(None)
        }

        fn kill(&mut self) -> autoprompt::pty::Result<()> {
            Ok(())
        }

        fn process_group(&self) -> Option<u32> {
            Some(self.pgid)
        }
    }

    /// Dropping a session while its worker is reaping still kills the group.
    #[tokio::test]
    async fn drop_kills_group_held_by_worker() {
        let mut group = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pgid = group.id().unwrap();

        let waiting = Arc::new(Notify::new());
        let strategy = Scripted::new(
            vec![Ok(Vec::new())],
            false,
            Box::new(Unreaped {
                pgid,
                waiting: Arc::clone(&waiting),
            }),
        );
        let config = SessionConfig::new()
            .poll_interval(Duration::from_millis(10))
            .exit_wait(Duration::from_secs(60));
        let mut session =
            Session::with_selector(config, BackendSelector::with_strategies(vec![Box::new(strategy)]));
        session.start("scripted", Vec::<String>::new()).await.unwrap();

        // The worker saw end of output and now holds the child while reaping.
        tokio::time::timeout(EVENT_TIMEOUT, waiting.notified()).await.unwrap();
        drop(session);

        let status = tokio::time::timeout(EVENT_TIMEOUT, group.wait())
            .await
            .expect("process group survived drop")
            .unwrap();
        assert!(!status.success());
    }
}
