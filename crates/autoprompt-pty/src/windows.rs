//! Windows pseudo-console strategy.
//!
//! Uses `ConPTY`, available on Windows 10 version 1809 (build 17763) and
//! Windows Server 2019 onwards. On older systems spawning fails with
//! [`PtyError::ConPtyNotAvailable`] and the selector moves on to the pipe
//! fallback.

mod child;
mod conpty;
mod io;
mod pipes;

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

pub use child::ConPtyChild;
pub use conpty::{ConPty, is_conpty_available};
pub use io::{ConPtyReader, ConPtyWriter};
pub use pipes::PipePair;

use crate::backend::BackendKind;
use crate::channel::{Channel, ChannelReader, ChannelWriter};
use crate::config::PtyConfig;
use crate::error::{PtyError, Result};

/// Spawn `program` attached to a new pseudo console.
pub(crate) fn spawn(program: &OsStr, args: &[OsString], config: &PtyConfig) -> Result<Channel> {
    if !is_conpty_available() {
        return Err(PtyError::ConPtyNotAvailable);
    }

    let input = PipePair::new().map_err(PtyError::Create)?;
    let output = PipePair::new().map_err(PtyError::Create)?;

    // The console keeps its own duplicates of the child-facing ends.
    let conpty = Arc::new(ConPty::new(config.window_size, input.read, output.write)?);
    let child = child::spawn_child(&conpty, program, args, config)?;

    Ok(Channel::new(
        BackendKind::NativePty,
        ChannelReader::new(Box::new(ConPtyReader::new(output.read))),
        ChannelWriter::new(
            Box::new(ConPtyWriter::new(input.write)),
            Some(Box::new(Arc::clone(&conpty))),
            config.window_size,
        ),
        Box::new(child.with_console(conpty)),
    ))
}
