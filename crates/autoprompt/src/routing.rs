//! Event routing between a session, the automation engine and a screen.
//!
//! A [`Router`] owns a [`Session`], an [`AutomationEngine`] and a
//! [`ScreenSink`]. Each output chunk is decoded, fed to the screen and then
//! offered to the engine; a firing rule's response is written back to the
//! session at once, or after the rule's delay without holding up later
//! chunks. Other tasks can steer the session through a [`RouterHandle`].
//!
//! ```no_run
//! use autoprompt::{AutomationEngine, AutomationRule, Router, Session, SessionConfig, Transcript};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AutomationEngine::new(vec![
//!     AutomationRule::builder("login:", "bob\r\n").build()?,
//! ]);
//! let mut router = Router::new(Session::new(SessionConfig::default()), engine, Transcript::new())?;
//!
//! router.start("login", Vec::<String>::new()).await?;
//! let state = router.run().await;
//! println!("{state}: {}", router.screen().text());
//! # Ok(())
//! # }
//! ```

mod screen;

pub use screen::{NullScreen, ScreenSink, Transcript, WriterScreen};

use std::ffi::OsStr;
use std::fmt;

use bytes::Bytes;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;

use crate::automation::{AutomationEngine, Firing};
use crate::encoding::Utf8Decoder;
use crate::error::{RouterError, SpawnError};
use crate::session::{Session, SessionEvent, SessionState, Spawned};

/// A request submitted through a [`RouterHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write bytes to the session.
    Write(Bytes),
    /// Resize the session and the screen.
    Resize {
        /// New width.
        cols: u16,
        /// New height.
        rows: u16,
    },
    /// Stop the session.
    Stop,
}

/// Cloneable sender of [`Command`]s to a router.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RouterHandle {
    /// Queue a write.
    pub fn write(&self, data: impl Into<Bytes>) -> Result<(), RouterError> {
        self.send(Command::Write(data.into()))
    }

    /// Queue a resize of both the session and the screen.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), RouterError> {
        self.send(Command::Resize { cols, rows })
    }

    /// Queue a stop.
    pub fn stop(&self) -> Result<(), RouterError> {
        self.send(Command::Stop)
    }

    /// Queue any command.
    pub fn send(&self, command: Command) -> Result<(), RouterError> {
        self.tx.send(command).map_err(|_| RouterError::Closed)
    }
}

enum Step {
    Event(SessionEvent),
    Due(Firing),
    Command(Command),
    Closed,
}

/// Connects a session's output to an automation engine and a screen.
pub struct Router<S: ScreenSink = NullScreen> {
    session: Session,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    engine: AutomationEngine,
    screen: S,
    decoder: Utf8Decoder,
    pending: FuturesUnordered<BoxFuture<'static, Firing>>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
    ended: bool,
}

impl<S: ScreenSink> fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("session", &self.session)
            .field("engine", &self.engine)
            .field("pending", &self.pending.len())
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

impl<S: ScreenSink> Router<S> {
    /// Take over `session`, which must still own its event receiver.
    pub fn new(mut session: Session, engine: AutomationEngine, screen: S) -> Result<Self, RouterError> {
        let events = session.events().ok_or(RouterError::EventsTaken)?;
        let (commands_tx, commands) = mpsc::unbounded_channel();
        Ok(Self {
            session,
            events,
            engine,
            screen,
            decoder: Utf8Decoder::new(),
            pending: FuturesUnordered::new(),
            commands_tx,
            commands,
            ended: false,
        })
    }

    /// A handle for submitting commands from other tasks.
    #[must_use]
    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            tx: self.commands_tx.clone(),
        }
    }

    /// The session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The session, for direct commands.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// The automation engine.
    #[must_use]
    pub const fn engine(&self) -> &AutomationEngine {
        &self.engine
    }

    /// The automation engine, e.g. to toggle rules.
    pub const fn engine_mut(&mut self) -> &mut AutomationEngine {
        &mut self.engine
    }

    /// The screen sink.
    #[must_use]
    pub const fn screen(&self) -> &S {
        &self.screen
    }

    /// The screen sink.
    pub const fn screen_mut(&mut self) -> &mut S {
        &mut self.screen
    }

    /// Number of delayed responses not yet written.
    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.pending.len()
    }

    /// Start the session, sized to the screen if the screen has a geometry.
    pub async fn start<I, A>(&mut self, command: impl AsRef<OsStr>, args: I) -> Result<Spawned, SpawnError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        if let Some(size) = self.screen.size() {
            // Failure is already published as an Error event.
            let _ = self.session.resize(size.cols, size.rows);
        }
        self.session.start(command, args).await
    }

    /// Drive the routing by one session event.
    ///
    /// Delayed responses and handle commands are processed while waiting.
    /// Returns the event after routing it, or `None` once the session has
    /// ended and every queued event was returned.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            if self.ended {
                return self.events.try_recv().ok();
            }

            let step = tokio::select! {
                biased;
                event = self.events.recv() => event.map_or(Step::Closed, Step::Event),
                Some(firing) = self.pending.next(), if !self.pending.is_empty() => Step::Due(firing),
                command = self.commands.recv() => command.map_or(Step::Closed, Step::Command),
            };

            match step {
                Step::Event(event) => {
                    self.route(&event).await;
                    return Some(event);
                }
                Step::Due(firing) => self.respond(firing).await,
                Step::Command(command) => self.apply(command).await,
                Step::Closed => return None,
            }
        }
    }

    /// Route events until the session ends. Returns its final state.
    ///
    /// The session must have been started, or a [`RouterHandle`] must
    /// eventually stop it.
    pub async fn run(&mut self) -> SessionState {
        while self.next().await.is_some() {}
        self.session.state()
    }

    /// Stop the session and discard delayed responses.
    pub async fn stop(&mut self) -> SessionState {
        self.discard_pending();
        self.session.stop().await
    }

    async fn route(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Output(bytes) => {
                let decoded = self.decoder.decode(bytes);
                if decoded.had_errors() {
                    tracing::trace!(replaced = decoded.replacements, "invalid UTF-8 in output");
                }
                if decoded.text.is_empty() {
                    return;
                }
                self.screen.feed(&decoded.text);
                if let Some(firing) = self.engine.evaluate(&decoded.text) {
                    if firing.delay.is_zero() {
                        self.respond(firing).await;
                    } else {
                        self.schedule(firing);
                    }
                }
            }
            SessionEvent::Exited(_) | SessionEvent::Failed(_) => {
                let tail = self.decoder.finish();
                if !tail.text.is_empty() {
                    self.screen.feed(&tail.text);
                }
                self.discard_pending();
                self.ended = true;
            }
            SessionEvent::Error(message) => {
                tracing::debug!(%message, "session reported an error");
            }
        }
    }

    fn schedule(&mut self, firing: Firing) {
        tracing::debug!(
            rule = firing.rule_index,
            delay_ms = firing.delay.as_millis() as u64,
            "scheduling delayed response"
        );
        self.pending.push(Box::pin(async move {
            tokio::time::sleep(firing.delay).await;
            firing
        }));
    }

    fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(count = self.pending.len(), "dropping delayed responses; session ended");
            self.pending = FuturesUnordered::new();
        }
    }

    async fn respond(&mut self, firing: Firing) {
        if !self.session.state().is_running() {
            tracing::debug!(rule = firing.rule_index, "dropping response; session not running");
            return;
        }
        match self.session.write(&firing.response).await {
            Ok(()) => tracing::debug!(
                rule = firing.rule_index,
                name = firing.name.as_deref().unwrap_or(""),
                bytes = firing.response.len(),
                "sent automation response"
            ),
            Err(e) => tracing::warn!(rule = firing.rule_index, error = %e, "automation response failed"),
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::Write(data) => {
                if let Err(e) = self.session.write(&data).await {
                    tracing::debug!(error = %e, "queued write failed");
                }
            }
            Command::Resize { cols, rows } => match self.session.resize(cols, rows) {
                Ok(_) => self.screen.resize(cols, rows),
                Err(e) => tracing::debug!(error = %e, "queued resize failed"),
            },
            Command::Stop => {
                self.discard_pending();
                self.session.stop().await;
            }
        }
    }
}
