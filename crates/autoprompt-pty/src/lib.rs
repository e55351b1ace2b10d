//! autoprompt-pty: spawn an interactive child behind a byte channel.
//!
//! This crate starts a child process behind a [`Channel`]: a bidirectional,
//! binary-safe byte pipe with bounded reads, best-effort resize and a
//! lifecycle handle for the child. Several spawn strategies exist and a
//! [`BackendSelector`] tries them in priority order.
//!
//! # Strategies
//!
//! - **Native PTY**: a Unix pseudo-terminal via `rustix`, or `ConPTY` via
//!   `windows-sys` on Windows 10 1809+.
//! - **Pipe fallback**: plain pipes through `tokio::process`. No resize, no
//!   echo, stdout and stderr merged.
//!
//! # Example
//!
//! ```no_run
//! use std::ffi::{OsStr, OsString};
//! use std::time::Duration;
//! use autoprompt_pty::{BackendSelector, PtyConfig, ReadChunk};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let selection = BackendSelector::new()
//!     .spawn(OsStr::new("sh"), &[OsString::from("-c"), OsString::from("echo hi")], &PtyConfig::default())
//!     .await?;
//! for attempt in &selection.skipped {
//!     eprintln!("skipped {attempt}");
//! }
//!
//! let mut channel = selection.channel;
//! while let ReadChunk::Data(bytes) = channel.read_chunk(Duration::from_millis(500)).await? {
//!     print!("{}", String::from_utf8_lossy(&bytes));
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod pipe;
pub mod process;
pub mod traits;

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

pub use backend::{BackendKind, BackendSelector, NativePty, PipeFallback, Selection, SpawnStrategy};
pub use channel::{
    Channel, ChannelReader, ChannelWriter, ChildHandle, READ_CHUNK_SIZE, ReadChunk, ResizeOutcome,
};
pub use config::{PtyConfig, PtyConfigBuilder, WindowSize};
pub use error::{BackendAttempt, BackendUnavailable, PtyError, Result};
pub use traits::{ExitStatus, PtyChild, Resize};
