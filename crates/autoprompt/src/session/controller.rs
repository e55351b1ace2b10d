//! The session controller.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use autoprompt_pty::{
    BackendAttempt, BackendKind, BackendSelector, ChannelWriter, ChildHandle, ResizeOutcome,
    WindowSize,
};
use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::config::SessionConfig;
use super::event::SessionEvent;
use super::state::SessionState;
use super::worker::{self, WorkerConfig};
use crate::error::{SessionError, SpawnError};

/// State shared between the session and its reader worker.
pub(super) struct Shared {
    state: Mutex<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn state(&self) -> SessionState {
        self.lock().clone()
    }

    fn set(&self, state: SessionState) {
        *self.lock() = state;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("session event dropped; no receiver");
        }
    }

    /// Publish an error event.
    fn emit_error(&self, message: String) {
        self.send(SessionEvent::Error(message));
    }

    /// Publish output while the session is running.
    ///
    /// Returns false once the session has ended.
    pub(super) fn emit_output(&self, data: Bytes) -> bool {
        let state = self.lock();
        if !state.is_running() {
            return false;
        }
        self.send(SessionEvent::Output(data));
        true
    }

    /// Move a running session to a terminal state and publish its event.
    ///
    /// Only the first caller wins; later calls leave the state untouched.
    pub(super) fn finish(&self, terminal: SessionState) -> bool {
        let event = match &terminal {
            SessionState::Exited(code) => SessionEvent::Exited(*code),
            SessionState::Failed(reason) => SessionEvent::Failed(reason.clone()),
            _ => return false,
        };
        let mut state = self.lock();
        if !state.is_running() {
            return false;
        }
        *state = terminal;
        self.send(event);
        true
    }
}

/// What [`Session::start`] produced.
#[derive(Debug, Clone)]
pub struct Spawned {
    /// The backend that spawned the child.
    pub backend: BackendKind,
    /// The child's process ID, if known.
    pub pid: Option<u32>,
    /// Backends tried and rejected first, in order.
    pub skipped: Vec<BackendAttempt>,
}

impl Spawned {
    /// Whether a lower-priority backend had to be used.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        !self.skipped.is_empty()
    }
}

struct Active {
    writer: ChannelWriter,
    child: ChildHandle,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
    backend: BackendKind,
    pid: Option<u32>,
    #[cfg_attr(not(unix), allow(dead_code))]
    process_group: Option<u32>,
}

/// One interactive child behind a channel.
///
/// Commands (`start`, `write`, `resize`, `stop`) take `&mut self`; results of
/// the child's activity arrive as [`SessionEvent`]s on the receiver returned
/// by [`events`](Self::events).
///
/// ```no_run
/// use autoprompt::{Session, SessionConfig, SessionEvent};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::new(SessionConfig::default());
/// let mut events = session.events().expect("fresh session");
///
/// session.start("sh", ["-c", "echo hi"]).await?;
/// while let Some(event) = events.recv().await {
///     match event {
///         SessionEvent::Output(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
///         SessionEvent::Exited(code) => { println!("exit {code}"); break; }
///         SessionEvent::Failed(reason) => { eprintln!("{reason}"); break; }
///         SessionEvent::Error(message) => eprintln!("{message}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: SessionConfig,
    selector: BackendSelector,
    shared: Arc<Shared>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    active: Option<Active>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("backend", &self.backend())
            .field("pid", &self.pid())
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an idle session using the default backend order.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_selector(config, BackendSelector::new())
    }

    /// Create an idle session with a custom backend order.
    #[must_use]
    pub fn with_selector(config: SessionConfig, selector: BackendSelector) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            selector,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Idle),
                events: tx,
            }),
            events: Some(rx),
            active: None,
        }
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The backend in use, once started.
    #[must_use]
    pub fn backend(&self) -> Option<BackendKind> {
        self.active.as_ref().map(|a| a.backend)
    }

    /// The child's process ID, once started.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().and_then(|a| a.pid)
    }

    /// The configuration this session spawns with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The current terminal geometry.
    #[must_use]
    pub fn window_size(&self) -> WindowSize {
        self.active
            .as_ref()
            .map_or(self.config.window_size, |a| a.writer.window_size())
    }

    /// Spawn `command` with `args` and start the reader worker.
    ///
    /// Only an idle session can be started. On failure the session moves to
    /// `Failed` and no event is published.
    pub async fn start<I, S>(&mut self, command: impl AsRef<OsStr>, args: I) -> Result<Spawned, SpawnError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(SpawnError::AlreadyStarted { state });
        }

        let command = command.as_ref().to_os_string();
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        validate(&command, &args)?;

        self.shared.set(SessionState::Starting);
        let pty_config = self.config.pty_config();
        let selection = match self.selector.spawn(&command, &args, &pty_config).await {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "no backend could start the session");
                self.shared.set(SessionState::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        for attempt in &selection.skipped {
            tracing::warn!(
                backend = attempt.backend.name(),
                reason = %attempt.reason,
                "backend unavailable, falling back"
            );
        }

        let channel = selection.channel;
        let backend = channel.backend();
        let pid = channel.pid();
        for limitation in backend.limitations() {
            tracing::debug!(backend = backend.name(), limitation, "backend limitation");
        }

        let (reader, writer, child) = channel.split();
        let process_group = child.lock().await.process_group();
        let (shutdown, shutdown_rx) = watch::channel(false);
        self.shared.set(SessionState::Running);
        let worker = tokio::spawn(worker::run(
            reader,
            Arc::clone(&child),
            Arc::clone(&self.shared),
            shutdown_rx,
            WorkerConfig {
                poll_interval: self.config.poll_interval,
                exit_wait: self.config.exit_wait,
            },
        ));

        tracing::info!(
            command = %command.to_string_lossy(),
            backend = backend.name(),
            pid = ?pid,
            "session started"
        );
        self.active = Some(Active {
            writer,
            child,
            shutdown,
            worker,
            backend,
            pid,
            process_group,
        });

        Ok(Spawned {
            backend,
            pid,
            skipped: selection.skipped,
        })
    }

    /// Write raw bytes to the child.
    ///
    /// Failures are also published as [`SessionEvent::Error`]; the session
    /// keeps running.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let state = self.state();
        let active = match self.active.as_mut() {
            Some(active) if state.is_running() => active,
            _ => {
                let err = SessionError::NotRunning { state };
                self.shared.emit_error(err.to_string());
                return Err(err);
            }
        };

        if let Err(e) = active.writer.write(data).await {
            tracing::warn!(error = %e, bytes = data.len(), "write to session failed");
            self.shared.emit_error(format!("write failed: {e}"));
            return Err(e.into());
        }
        tracing::trace!(bytes = data.len(), "wrote to session");
        Ok(())
    }

    /// Change the terminal geometry.
    ///
    /// Before `start` this sets the geometry the child is spawned with. On a
    /// backend without a terminal, or after the session ended, it does
    /// nothing. Zero dimensions and I/O failures are published as
    /// [`SessionEvent::Error`].
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<ResizeOutcome, SessionError> {
        let state = self.state();
        let result = match (&state, self.active.as_mut()) {
            (SessionState::Idle | SessionState::Starting, _) => {
                WindowSize::checked(cols, rows).map(|size| {
                    self.config.window_size = size;
                    ResizeOutcome::Applied
                })
            }
            (SessionState::Running, Some(active)) => active.writer.resize(cols, rows),
            _ => {
                tracing::debug!(%state, cols, rows, "resize ignored; session not running");
                return Ok(ResizeOutcome::Unsupported);
            }
        };

        match result {
            Ok(outcome) => {
                if outcome == ResizeOutcome::Unsupported {
                    tracing::trace!(cols, rows, "resize not supported by backend");
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(error = %e, cols, rows, "resize failed");
                self.shared.emit_error(format!("resize failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Stop the reader worker, end the child and close the channel.
    ///
    /// Publishes `Exited` (or `Failed` if the child cannot be reaped) unless
    /// the session already ended. Returns the final state. Calling it on an
    /// idle or already stopped session just returns the state.
    pub async fn stop(&mut self) -> SessionState {
        let Some(active) = self.active.take() else {
            return self.state();
        };
        let Active {
            mut writer,
            child,
            shutdown,
            worker,
            ..
        } = active;

        if shutdown.send(true).is_err() {
            tracing::trace!("reader worker already finished");
        }
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "reader worker did not finish cleanly");
        }

        let outcome = {
            let mut child = child.lock().await;
            worker::kill_and_reap(&mut **child, self.config.exit_wait).await
        };
        if let Err(e) = writer.close().await {
            tracing::debug!(error = %e, "closing session input failed");
        }

        let terminal = match outcome {
            Ok(status) => SessionState::Exited(status.exit_code()),
            Err(reason) => SessionState::Failed(reason),
        };
        if self.shared.finish(terminal) {
            tracing::info!(state = %self.state(), "session stopped");
        }
        self.state()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.worker.abort();
            match active.child.try_lock() {
                Ok(mut child) => {
                    if let Err(e) = child.kill() {
                        tracing::debug!(error = %e, "failed to kill child on drop");
                    }
                }
                // The aborted worker still holds the child until it is dropped.
                Err(_) => {
                    #[cfg(unix)]
                    if let Some(pgid) = active.process_group {
                        if let Err(e) = autoprompt_pty::process::kill_process_group(pgid) {
                            tracing::debug!(pgid, error = %e, "failed to kill process group on drop");
                        }
                    }
                }
            }
        }
    }
}

fn validate(command: &OsStr, args: &[OsString]) -> Result<(), SpawnError> {
    if command.is_empty() {
        return Err(SpawnError::invalid_argument("command", "", "is empty"));
    }
    if command.as_encoded_bytes().contains(&0) {
        return Err(SpawnError::invalid_argument(
            "command",
            command.to_string_lossy(),
            "contains a NUL byte",
        ));
    }
    if let Some(arg) = args.iter().find(|a| a.as_encoded_bytes().contains(&0)) {
        return Err(SpawnError::invalid_argument(
            "argument",
            arg.to_string_lossy(),
            "contains a NUL byte",
        ));
    }
    Ok(())
}
