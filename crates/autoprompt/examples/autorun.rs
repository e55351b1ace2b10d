//! Run a shell in the current terminal, answering prompts from a config file.
//!
//! ```text
//! cargo run -p autoprompt --example autorun -- rules.toml
//! ```
//!
//! Keystrokes are forwarded to the child and terminal resizes are applied
//! to its PTY. The session ends when the child exits.

use std::io;

use autoprompt::{AppConfig, Router, RouterHandle, Session, WindowSize, WriterScreen, logging};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;

/// Restores cooked mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .apply_env();
    logging::init(&config.logging)?;

    let engine = config.automation_engine()?;
    let size = crossterm::terminal::size()
        .ok()
        .map(|(cols, rows)| WindowSize::new(cols, rows));
    let screen = WriterScreen::new(io::stdout(), size);
    let mut router = Router::new(Session::new(config.session_config()), engine, screen)?;

    let spawned = router.start(config.command(), &config.shell_args).await?;
    tracing::info!(backend = %spawned.backend, pid = ?spawned.pid, "autorun started");

    let raw = RawMode::enable()?;
    let input = tokio::spawn(forward_terminal(router.handle()));
    let state = router.run().await;
    input.abort();
    drop(raw);

    eprintln!("\r\nsession ended: {state}");
    Ok(())
}

/// Forward key presses and resizes until the router goes away.
async fn forward_terminal(handle: RouterHandle) {
    let mut events = EventStream::new();
    while let Some(Ok(event)) = events.next().await {
        let sent = match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key_bytes(key) {
                Some(bytes) => handle.write(bytes),
                None => Ok(()),
            },
            Event::Paste(text) => handle.write(text),
            Event::Resize(cols, rows) => handle.resize(cols, rows),
            _ => Ok(()),
        };
        if sent.is_err() {
            break;
        }
    }
}

/// Encode a key the way a terminal would send it.
fn key_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let bytes = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let upper = c.to_ascii_uppercase();
            if !('@'..='_').contains(&upper) {
                return None;
            }
            vec![upper as u8 & 0x1f]
        }
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            let mut bytes = c.encode_utf8(&mut buf).as_bytes().to_vec();
            if key.modifiers.contains(KeyModifiers::ALT) {
                bytes.insert(0, 0x1b);
            }
            bytes
        }
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        _ => return None,
    };
    Some(bytes)
}
