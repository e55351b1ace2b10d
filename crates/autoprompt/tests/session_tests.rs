//! Integration tests for the session controller.
//!
//! These tests spawn real processes through the default backend order.

#![cfg(unix)] // Spawns Unix programs

use std::time::Duration;

use autoprompt::{
    BackendKind, BackendSelector, ResizeOutcome, Session, SessionConfig, SessionError,
    SessionEvent, SessionState, SpawnError,
};
use tokio::sync::mpsc::UnboundedReceiver;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code reported for a child killed by SIGKILL.
const KILLED: i32 = 128 + 9;

/// Collect events until the terminal one; returns (output, terminal event).
async fn run_to_end(events: &mut UnboundedReceiver<SessionEvent>) -> (String, SessionEvent) {
    let mut output = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("session produced no event in time")
            .expect("event channel closed");
        match event {
            SessionEvent::Output(bytes) => output.extend_from_slice(&bytes),
            SessionEvent::Error(message) => panic!("unexpected error event: {message}"),
            terminal => return (String::from_utf8_lossy(&output).into_owned(), terminal),
        }
    }
}

/// Read output until it contains `needle`.
async fn wait_for(events: &mut UnboundedReceiver<SessionEvent>, needle: &str) -> String {
    let mut output = Vec::new();
    while !String::from_utf8_lossy(&output).contains(needle) {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for output")
            .expect("event channel closed");
        match event {
            SessionEvent::Output(bytes) => output.extend_from_slice(&bytes),
            other => panic!("unexpected event {other:?} while waiting for {needle:?}"),
        }
    }
    String::from_utf8_lossy(&output).into_owned()
}

/// `echo hi` produces its line and then exits cleanly.
#[tokio::test]
async fn echo_then_exit() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();

    let spawned = session.start("echo", ["hi"]).await.unwrap();
    assert_eq!(spawned.backend, BackendKind::NativePty);
    assert!(!spawned.used_fallback());
    assert_eq!(session.state(), SessionState::Running);

    let mut chunks = Vec::new();
    let terminal = loop {
        match tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap() {
            SessionEvent::Output(bytes) => chunks.push(bytes),
            other => break other,
        }
    };
    assert_eq!(chunks.len(), 1, "expected one output chunk, got {chunks:?}");
    let output = String::from_utf8_lossy(&chunks[0]);
    assert!(output == "hi\r\n" || output == "hi\n", "output: {output:?}");
    assert_eq!(terminal, SessionEvent::Exited(0));
    assert_eq!(session.state(), SessionState::Exited(0));

    // Nothing follows the terminal event.
    assert_eq!(session.stop().await, SessionState::Exited(0));
    assert!(events.try_recv().is_err());
}

/// The child's exit code is reported.
#[tokio::test]
async fn exit_code_is_reported() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();

    session.start("sh", ["-c", "exit 3"]).await.unwrap();
    let (_, terminal) = run_to_end(&mut events).await;
    assert_eq!(terminal, SessionEvent::Exited(3));
}

/// A session can only be started once.
#[tokio::test]
async fn second_start_is_rejected() {
    let mut session = Session::new(SessionConfig::default());
    session.start("cat", Vec::<String>::new()).await.unwrap();

    let err = session.start("cat", Vec::<String>::new()).await.unwrap_err();
    assert!(matches!(
        err,
        SpawnError::AlreadyStarted {
            state: SessionState::Running
        }
    ));
    session.stop().await;
}

/// When every backend fails the session fails without emitting events.
#[tokio::test]
async fn unknown_program_fails_every_backend() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();

    let err = session
        .start("autoprompt-test-missing-program", Vec::<String>::new())
        .await
        .unwrap_err();
    let SpawnError::BackendUnavailable(unavailable) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(unavailable.attempts.len(), 2);
    assert!(matches!(session.state(), SessionState::Failed(_)));
    assert!(events.try_recv().is_err());

    let err = session.start("echo", ["again"]).await.unwrap_err();
    assert!(matches!(err, SpawnError::AlreadyStarted { .. }));
}

/// Stopping a live child kills it and reports one exit event.
#[tokio::test]
async fn stop_kills_running_child() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();
    session.start("sleep", ["30"]).await.unwrap();

    let state = session.stop().await;
    assert_eq!(state, SessionState::Exited(KILLED));

    let mut terminal = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.is_terminal() {
            terminal.push(event);
        }
    }
    assert_eq!(terminal, vec![SessionEvent::Exited(KILLED)]);

    // A second stop changes nothing.
    assert_eq!(session.stop().await, state);
}

/// Writing after the session ended fails and emits an error event.
#[tokio::test]
async fn write_after_exit_reports_error() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();
    session.start("true", Vec::<String>::new()).await.unwrap();
    run_to_end(&mut events).await;

    let err = session.write(b"late\n").await.unwrap_err();
    assert!(matches!(err, SessionError::NotRunning { .. }));
    assert!(matches!(events.try_recv(), Ok(SessionEvent::Error(_))));
}

/// Written bytes reach the child and its answer comes back as output.
#[tokio::test]
async fn write_round_trip_over_pty() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();
    session
        .start("sh", ["-c", "read line; echo \"got:$line\""])
        .await
        .unwrap();

    session.write(b"ping\n").await.unwrap();
    let output = wait_for(&mut events, "got:ping").await;
    assert!(output.contains("got:ping"));

    let (_, terminal) = run_to_end(&mut events).await;
    assert_eq!(terminal, SessionEvent::Exited(0));
}

/// A resize reaches the child's terminal.
#[tokio::test]
async fn resize_reaches_child() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();
    session
        .start("sh", ["-c", "read _; stty size"])
        .await
        .unwrap();

    assert_eq!(session.resize(90, 30).unwrap(), ResizeOutcome::Applied);
    session.write(b"go\n").await.unwrap();

    let (output, _) = run_to_end(&mut events).await;
    assert!(output.contains("30 90"), "output: {output:?}");
}

/// A resize before start sets the spawn geometry.
#[tokio::test]
async fn resize_before_start_sets_initial_size() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();

    session.resize(101, 33).unwrap();
    session.start("stty", ["size"]).await.unwrap();

    let (output, terminal) = run_to_end(&mut events).await;
    assert!(output.contains("33 101"), "output: {output:?}");
    assert_eq!(terminal, SessionEvent::Exited(0));
}

/// A zero dimension is reported and the session keeps running.
#[tokio::test]
async fn invalid_resize_is_recoverable() {
    let mut session = Session::new(SessionConfig::default());
    let mut events = session.events().unwrap();
    session.start("cat", Vec::<String>::new()).await.unwrap();

    assert!(session.resize(0, 10).is_err());
    assert!(matches!(events.recv().await, Some(SessionEvent::Error(_))));
    assert_eq!(session.state(), SessionState::Running);
    session.stop().await;
}

/// On the pipe fallback resize is a silent no-op and I/O still works.
#[tokio::test]
async fn pipe_backend_round_trip() {
    let mut session = Session::with_selector(SessionConfig::default(), BackendSelector::pipe_only());
    let mut events = session.events().unwrap();

    let spawned = session
        .start("sh", ["-c", "read line; echo \"pipe:$line\""])
        .await
        .unwrap();
    assert_eq!(spawned.backend, BackendKind::Pipe);

    assert_eq!(session.resize(120, 50).unwrap(), ResizeOutcome::Unsupported);
    session.write(b"abc\n").await.unwrap();

    let (output, terminal) = run_to_end(&mut events).await;
    assert_eq!(output, "pipe:abc\n");
    assert_eq!(terminal, SessionEvent::Exited(0));
}

/// Binary output, including NUL and invalid UTF-8, arrives unchanged.
#[tokio::test]
async fn output_is_binary_safe() {
    let mut session = Session::with_selector(SessionConfig::default(), BackendSelector::pipe_only());
    let mut events = session.events().unwrap();
    session
        .start("printf", ["\\000\\377abc"])
        .await
        .unwrap();

    let mut output = Vec::new();
    loop {
        match tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap() {
            SessionEvent::Output(bytes) => output.extend_from_slice(&bytes),
            SessionEvent::Exited(0) => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(output, b"\x00\xffabc");
}

/// Dropping a running session kills its child.
#[tokio::test]
async fn drop_kills_child() {
    let mut session = Session::new(SessionConfig::default());
    session.start("sleep", ["30"]).await.unwrap();
    let pid = session.pid().expect("pty child has a pid");
    drop(session);

    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        if !is_alive(pid) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "child {pid} survived drop");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Whether `pid` names a live, non-zombie process.
fn is_alive(pid: u32) -> bool {
    let Ok(output) = std::process::Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output()
    else {
        return false;
    };
    let stat = String::from_utf8_lossy(&output.stdout);
    output.status.success() && !stat.trim().is_empty() && !stat.trim().starts_with('Z')
}
