//! Unix pseudo-terminal strategy.
//!
//! - PTY pair allocation via openpt/grantpt/unlockpt
//! - Async I/O on the master through tokio's `AsyncFd`
//! - Child started in its own session with the slave as controlling terminal
//!
//! Works on Linux, macOS and the BSDs (anything with `/dev/ptmx`).

mod child;
mod pty;

use std::ffi::{OsStr, OsString};

pub use child::spawn_child;
pub use pty::{UnixPtyMaster, open_slave};

use crate::backend::BackendKind;
use crate::channel::{Channel, ChannelReader, ChannelWriter};
use crate::config::PtyConfig;
use crate::error::Result;

/// Spawn `program` on a fresh pseudo-terminal.
pub(crate) fn spawn(program: &OsStr, args: &[OsString], config: &PtyConfig) -> Result<Channel> {
    let (master, slave_path) = UnixPtyMaster::open()?;
    master.set_window_size(config.window_size)?;

    let slave = open_slave(&slave_path)?;
    // The slave is dropped on return; only the child keeps it open, so the
    // master sees EOF once the child and its descendants are gone.
    let child = spawn_child(slave, program, args, config)?;

    let size = config.window_size;
    Ok(Channel::new(
        BackendKind::NativePty,
        ChannelReader::new(Box::new(master.clone())),
        ChannelWriter::new(Box::new(master.clone()), Some(Box::new(master)), size),
        Box::new(child),
    ))
}
