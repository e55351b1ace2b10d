//! Windows pseudo console handle.

use std::os::windows::io::{AsRawHandle, OwnedHandle};
use std::sync::Arc;

use windows_sys::Win32::Foundation::{HANDLE, S_OK};
use windows_sys::Win32::System::Console::{
    COORD, ClosePseudoConsole, CreatePseudoConsole, HPCON, ResizePseudoConsole,
};

use crate::config::WindowSize;
use crate::error::{PtyError, Result};
use crate::traits::Resize;

/// An open pseudo console. Closed on drop.
#[derive(Debug)]
pub struct ConPty {
    handle: HPCON,
}

// SAFETY: HPCON is an opaque kernel handle usable from any thread.
unsafe impl Send for ConPty {}
unsafe impl Sync for ConPty {}

const fn coord(size: WindowSize) -> COORD {
    COORD {
        X: size.cols as i16,
        Y: size.rows as i16,
    }
}

impl ConPty {
    /// Create a pseudo console that reads input from `input_read` and writes
    /// output to `output_write`.
    ///
    /// Both handles are duplicated by the console and closed here.
    pub fn new(size: WindowSize, input_read: OwnedHandle, output_write: OwnedHandle) -> Result<Self> {
        let mut hpc: HPCON = 0;

        // SAFETY: both handles are valid pipe ends and `hpc` is a valid out pointer.
        let result = unsafe {
            CreatePseudoConsole(
                coord(size),
                input_read.as_raw_handle() as HANDLE,
                output_write.as_raw_handle() as HANDLE,
                0,
                &mut hpc,
            )
        };

        if result != S_OK {
            return Err(PtyError::Windows {
                message: "failed to create pseudo console".into(),
                code: result as u32,
            });
        }
        if hpc == 0 {
            return Err(PtyError::ConPtyNotAvailable);
        }

        drop(input_read);
        drop(output_write);

        Ok(Self { handle: hpc })
    }

    /// The raw console handle, for attaching a process.
    #[must_use]
    pub const fn handle(&self) -> HPCON {
        self.handle
    }
}

impl Resize for Arc<ConPty> {
    fn resize(&self, size: WindowSize) -> Result<()> {
        // SAFETY: the handle stays valid until the last Arc is dropped.
        let result = unsafe { ResizePseudoConsole(self.handle, coord(size)) };

        if result != S_OK {
            return Err(PtyError::Resize(std::io::Error::other(format!(
                "ResizePseudoConsole failed with HRESULT {result:#x}"
            ))));
        }
        Ok(())
    }
}

impl Drop for ConPty {
    fn drop(&mut self) {
        // SAFETY: handle came from CreatePseudoConsole and is closed once.
        unsafe {
            ClosePseudoConsole(self.handle);
        }
    }
}

/// Whether this Windows build exports `CreatePseudoConsole`.
#[must_use]
pub fn is_conpty_available() -> bool {
    use windows_sys::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};

    // SAFETY: kernel32 is always loaded; the name is a valid wide string.
    let kernel32 = unsafe { GetModuleHandleW(windows_sys::w!("kernel32.dll")) };
    if kernel32.is_null() {
        return false;
    }

    // SAFETY: module handle is valid and the name is NUL-terminated.
    let proc = unsafe { GetProcAddress(kernel32, windows_sys::s!("CreatePseudoConsole")) };
    proc.is_some()
}
