//! Integration tests for routing output through the automation engine.

#![cfg(unix)] // Spawns Unix programs

use std::time::{Duration, Instant};

use autoprompt::{
    AutomationEngine, AutomationRule, NullScreen, Router, RouterError, Session, SessionConfig,
    SessionEvent, SessionState, Transcript, WindowSize,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

const LOGIN_SCRIPT: &str =
    "printf 'login: '; read user; printf 'Password: '; read pw; echo \"user=$user pw=$pw\"";

fn login_rules() -> AutomationEngine {
    AutomationEngine::new(vec![
        AutomationRule::builder("login:", "bob\n").build().unwrap(),
        AutomationRule::builder("Password:", "secret\n").build().unwrap(),
    ])
}

async fn run<S: autoprompt::ScreenSink>(router: &mut Router<S>) -> SessionState {
    tokio::time::timeout(RUN_TIMEOUT, router.run())
        .await
        .expect("session did not finish in time")
}

/// Prompts are answered in order and each rule fires once.
#[tokio::test]
async fn answers_login_and_password() {
    let session = Session::new(SessionConfig::default());
    let mut router = Router::new(session, login_rules(), Transcript::new()).unwrap();

    router.start("sh", ["-c", LOGIN_SCRIPT]).await.unwrap();
    assert_eq!(run(&mut router).await, SessionState::Exited(0));

    assert!(
        router.screen().text().contains("user=bob pw=secret"),
        "transcript: {:?}",
        router.screen().text()
    );
    assert!(router.engine().rules().iter().all(AutomationRule::fired));
}

/// A delayed response is written after its delay without blocking output.
#[tokio::test]
async fn delayed_response_waits() {
    let engine = AutomationEngine::new(vec![
        AutomationRule::builder("ready>", "go\n")
            .delay(Duration::from_millis(300))
            .build()
            .unwrap(),
    ]);
    let mut router = Router::new(Session::new(SessionConfig::default()), engine, Transcript::new()).unwrap();

    let started = Instant::now();
    router
        .start("sh", ["-c", "printf 'ready> '; read answer; echo \"answer=$answer\""])
        .await
        .unwrap();

    // The prompt is routed before the response is due.
    let first = router.next().await.unwrap();
    assert!(matches!(first, SessionEvent::Output(_)));
    assert_eq!(router.pending_responses(), 1);

    assert_eq!(run(&mut router).await, SessionState::Exited(0));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(router.screen().text().contains("answer=go"));
}

/// Responses still queued when the session ends are dropped.
#[tokio::test]
async fn pending_responses_are_dropped_at_exit() {
    let engine = AutomationEngine::new(vec![
        AutomationRule::builder("bye", "never\n")
            .delay(Duration::from_secs(30))
            .build()
            .unwrap(),
    ]);
    let mut router = Router::new(Session::new(SessionConfig::default()), engine, NullScreen).unwrap();

    router.start("echo", ["bye"]).await.unwrap();
    assert_eq!(run(&mut router).await, SessionState::Exited(0));
    assert_eq!(router.pending_responses(), 0);
    assert!(router.engine().rules()[0].fired());
}

/// The session is sized to the screen before the child starts.
#[tokio::test]
async fn screen_size_is_applied_at_start() {
    let mut router = Router::new(
        Session::new(SessionConfig::default()),
        AutomationEngine::default(),
        Transcript::with_size(100, 40),
    )
    .unwrap();

    router.start("stty", ["size"]).await.unwrap();
    run(&mut router).await;
    assert!(router.screen().text().contains("40 100"));
}

/// Commands from a handle reach the session and the screen.
#[tokio::test]
async fn handle_commands() {
    let mut router = Router::new(
        Session::new(SessionConfig::default()),
        AutomationEngine::default(),
        Transcript::new(),
    )
    .unwrap();
    router
        .start("sh", ["-c", "read _; stty size; read _"])
        .await
        .unwrap();

    let handle = router.handle();
    let driver = tokio::spawn(async move {
        handle.resize(91, 31).unwrap();
        handle.write("one\n").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop().unwrap();
    });

    let state = run(&mut router).await;
    driver.await.unwrap();

    assert!(state.is_terminal());
    assert!(router.screen().text().contains("31 91"));
    assert_eq!(router.screen().resizes(), &[WindowSize::new(91, 31)]);
}

/// A handle outliving its router reports that it is closed.
#[tokio::test]
async fn handle_after_router_dropped() {
    let router = Router::new(
        Session::new(SessionConfig::default()),
        AutomationEngine::default(),
        NullScreen,
    )
    .unwrap();
    let handle = router.handle();
    drop(router);

    assert!(matches!(handle.write("x"), Err(RouterError::Closed)));
}

/// A router needs the session's event receiver.
#[test]
fn router_requires_events() {
    let mut session = Session::new(SessionConfig::default());
    let _events = session.events();

    let err = Router::new(session, AutomationEngine::default(), NullScreen).unwrap_err();
    assert!(matches!(err, RouterError::EventsTaken));
}
