//! Anonymous pipes connecting the application to a pseudo console.

use std::os::windows::io::{FromRawHandle, OwnedHandle, RawHandle};
use std::{io, ptr};

use windows_sys::Win32::Foundation::{HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Pipes::CreatePipe;

/// A connected pipe.
#[derive(Debug)]
pub struct PipePair {
    /// Read end of the pipe.
    pub read: OwnedHandle,
    /// Write end of the pipe.
    pub write: OwnedHandle,
}

impl PipePair {
    /// Create a new, non-inheritable pipe.
    pub fn new() -> io::Result<Self> {
        let mut read_handle: HANDLE = INVALID_HANDLE_VALUE;
        let mut write_handle: HANDLE = INVALID_HANDLE_VALUE;

        // SAFETY: out pointers are valid; null security attributes means the
        // handles are not inherited.
        let result = unsafe { CreatePipe(&mut read_handle, &mut write_handle, ptr::null(), 0) };

        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: CreatePipe succeeded, so both handles are valid and owned by us.
        Ok(Self {
            read: unsafe { OwnedHandle::from_raw_handle(read_handle as RawHandle) },
            write: unsafe { OwnedHandle::from_raw_handle(write_handle as RawHandle) },
        })
    }
}
