//! Processes attached to a pseudo console.
//!
//! Each child is placed in a Job Object configured to kill everything in the
//! job when its handle closes, so descendants never outlive the channel.

use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::pin::Pin;
use std::sync::Arc;
use std::{io, ptr};

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
    SetInformationJobObject, TerminateJobObject,
};
use windows_sys::Win32::System::Threading::{
    CREATE_UNICODE_ENVIRONMENT, CreateProcessW, DeleteProcThreadAttributeList,
    EXTENDED_STARTUPINFO_PRESENT, GetExitCodeProcess, INFINITE, InitializeProcThreadAttributeList,
    LPPROC_THREAD_ATTRIBUTE_LIST, PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE, PROCESS_INFORMATION,
    STARTUPINFOEXW, TerminateProcess, UpdateProcThreadAttribute, WaitForSingleObject,
};

use super::conpty::ConPty;
use crate::config::PtyConfig;
use crate::error::{PtyError, Result};
use crate::traits::{ExitStatus, PtyChild};

const FALSE: i32 = 0;

/// A process attached to a pseudo console.
#[derive(Debug)]
pub struct ConPtyChild {
    process: Arc<OwnedHandle>,
    pid: u32,
    job: Option<OwnedHandle>,
    status: Option<ExitStatus>,
    /// Keeps the console open for as long as the child handle lives.
    console: Option<Arc<ConPty>>,
}

impl ConPtyChild {
    fn new(process: OwnedHandle, pid: u32, job: Option<OwnedHandle>) -> Self {
        Self {
            process: Arc::new(process),
            pid,
            job,
            status: None,
            console: None,
        }
    }

    /// Tie the console's lifetime to this child.
    #[must_use]
    pub fn with_console(mut self, console: Arc<ConPty>) -> Self {
        self.console = Some(console);
        self
    }

    fn exit_code(handle: HANDLE) -> io::Result<u32> {
        let mut exit_code: u32 = 0;
        // SAFETY: handle is a valid process handle and exit_code a valid out pointer.
        if unsafe { GetExitCodeProcess(handle, &mut exit_code) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(exit_code)
    }

    fn record(&mut self, exit_code: u32) -> ExitStatus {
        let status = ExitStatus::Exited(exit_code as i32);
        self.status = Some(status);
        // Closing the console lets pending reads on its output pipe finish.
        self.console = None;
        status
    }

    async fn wait_inner(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let process = Arc::clone(&self.process);
        let exit_code = tokio::task::spawn_blocking(move || {
            let handle = process.as_raw_handle() as HANDLE;
            // SAFETY: handle is valid for as long as `process` is alive.
            if unsafe { WaitForSingleObject(handle, INFINITE) } != WAIT_OBJECT_0 {
                return Err(io::Error::last_os_error());
            }
            Self::exit_code(handle)
        })
        .await
        .map_err(|e| PtyError::Wait(io::Error::other(e)))?
        .map_err(PtyError::Wait)?;

        Ok(self.record(exit_code))
    }
}

impl PtyChild for ConPtyChild {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ExitStatus>> + Send + '_>> {
        Box::pin(self.wait_inner())
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }

        let handle = self.process.as_raw_handle() as HANDLE;
        // SAFETY: handle is valid.
        if unsafe { WaitForSingleObject(handle, 0) } != WAIT_OBJECT_0 {
            return Ok(None);
        }
        let exit_code = Self::exit_code(handle).map_err(PtyError::Wait)?;
        Ok(Some(self.record(exit_code)))
    }

    fn kill(&mut self) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }

        // SAFETY: job and process handles are valid.
        let ok = unsafe {
            match &self.job {
                Some(job) => TerminateJobObject(job.as_raw_handle() as HANDLE, 1),
                None => TerminateProcess(self.process.as_raw_handle() as HANDLE, 1),
            }
        };
        if ok == FALSE {
            return Err(PtyError::Signal(io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// Start `program` attached to `conpty`.
pub(super) fn spawn_child(
    conpty: &ConPty,
    program: &OsStr,
    args: &[OsString],
    config: &PtyConfig,
) -> Result<ConPtyChild> {
    let mut cmdline = escape_argument(program);
    for arg in args {
        cmdline.push(u16::from(b' '));
        cmdline.extend(escape_argument(arg));
    }
    cmdline.push(0);

    let env_block = build_environment_block(&config.child_env());

    let working_dir = config.working_directory.as_ref().map(|p| {
        let mut w = to_wide_string(p.as_os_str());
        w.push(0);
        w
    });

    let job = create_job_object();
    let mut attributes = AttributeList::with_pseudo_console(conpty)?;

    // SAFETY: STARTUPINFOEXW is plain data; zeroed is its documented initial state.
    let mut startup_info: STARTUPINFOEXW = unsafe { std::mem::zeroed() };
    startup_info.StartupInfo.cb = std::mem::size_of::<STARTUPINFOEXW>() as u32;
    startup_info.lpAttributeList = attributes.as_mut_ptr();

    // SAFETY: PROCESS_INFORMATION is plain data filled in by CreateProcessW.
    let mut process_info: PROCESS_INFORMATION = unsafe { std::mem::zeroed() };

    // SAFETY: every pointer refers to a live, NUL-terminated buffer owned by
    // this frame.
    let result = unsafe {
        CreateProcessW(
            ptr::null(),
            cmdline.as_mut_ptr(),
            ptr::null(),
            ptr::null(),
            FALSE,
            EXTENDED_STARTUPINFO_PRESENT | CREATE_UNICODE_ENVIRONMENT,
            env_block.as_ptr().cast(),
            working_dir.as_ref().map_or(ptr::null(), |w| w.as_ptr()),
            &startup_info.StartupInfo,
            &mut process_info,
        )
    };

    if result == FALSE {
        return Err(PtyError::Spawn(io::Error::last_os_error()));
    }

    // SAFETY: the thread handle is valid and not needed.
    unsafe {
        CloseHandle(process_info.hThread);
    }

    // SAFETY: CreateProcessW succeeded, so hProcess is valid and owned by us.
    let process = unsafe { OwnedHandle::from_raw_handle(process_info.hProcess as RawHandle) };

    if let Some(ref job_handle) = job {
        // SAFETY: both handles are valid.
        let assigned = unsafe {
            AssignProcessToJobObject(
                job_handle.as_raw_handle() as HANDLE,
                process.as_raw_handle() as HANDLE,
            )
        };
        if assigned == FALSE {
            tracing::debug!(
                pid = process_info.dwProcessId,
                error = %io::Error::last_os_error(),
                "could not assign child to job object"
            );
        }
    }

    Ok(ConPtyChild::new(process, process_info.dwProcessId, job))
}

/// Owned `PROC_THREAD_ATTRIBUTE_LIST` carrying the pseudo console.
struct AttributeList {
    buffer: Vec<u8>,
}

impl AttributeList {
    fn with_pseudo_console(conpty: &ConPty) -> Result<Self> {
        let mut size: usize = 0;
        // SAFETY: querying the required size with a null list is documented usage.
        unsafe {
            InitializeProcThreadAttributeList(ptr::null_mut(), 1, 0, &mut size);
        }

        let mut list = Self {
            buffer: vec![0u8; size],
        };

        // SAFETY: buffer has the size requested above.
        if unsafe { InitializeProcThreadAttributeList(list.as_mut_ptr(), 1, 0, &mut size) }
            == FALSE
        {
            return Err(PtyError::Spawn(io::Error::last_os_error()));
        }

        // SAFETY: the list is initialised; for this attribute the value is the
        // HPCON itself.
        let updated = unsafe {
            UpdateProcThreadAttribute(
                list.as_mut_ptr(),
                0,
                PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE as usize,
                conpty.handle() as *const std::ffi::c_void,
                std::mem::size_of::<windows_sys::Win32::System::Console::HPCON>(),
                ptr::null_mut(),
                ptr::null(),
            )
        };
        if updated == FALSE {
            return Err(PtyError::Spawn(io::Error::last_os_error()));
        }

        Ok(list)
    }

    fn as_mut_ptr(&mut self) -> LPPROC_THREAD_ATTRIBUTE_LIST {
        self.buffer.as_mut_ptr().cast()
    }
}

impl Drop for AttributeList {
    fn drop(&mut self) {
        // SAFETY: the list was initialised in `with_pseudo_console`.
        unsafe { DeleteProcThreadAttributeList(self.as_mut_ptr()) };
    }
}

fn to_wide_string(s: &OsStr) -> Vec<u16> {
    s.encode_wide().collect()
}

/// Quote one argument following the Microsoft C runtime parsing rules.
///
/// Backslashes are literal unless they precede a quote, in which case they
/// are doubled and the quote is escaped. Trailing backslashes are doubled
/// because they precede the closing quote.
fn escape_argument(arg: &OsStr) -> Vec<u16> {
    let arg_str = arg.to_string_lossy();

    let needs_quoting = arg_str.is_empty() || arg_str.contains([' ', '\t', '"', '\\']);
    if !needs_quoting {
        return to_wide_string(arg);
    }

    let mut escaped = String::with_capacity(arg_str.len() + 2);
    escaped.push('"');

    let mut backslashes = 0usize;
    for c in arg_str.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                escaped.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                escaped.push('"');
                backslashes = 0;
            }
            _ => {
                escaped.extend(std::iter::repeat_n('\\', backslashes));
                escaped.push(c);
                backslashes = 0;
            }
        }
    }
    escaped.extend(std::iter::repeat_n('\\', backslashes * 2));
    escaped.push('"');

    escaped.encode_utf16().collect()
}

/// Build a `CREATE_UNICODE_ENVIRONMENT` block: `KEY=VALUE\0...\0`.
fn build_environment_block(env: &std::collections::HashMap<OsString, OsString>) -> Vec<u16> {
    let mut entries: Vec<_> = env.iter().collect();
    // Windows expects the block sorted by name.
    entries.sort_by_key(|(key, _)| key.to_string_lossy().to_uppercase());

    let mut block = Vec::new();
    for (key, value) in entries {
        block.extend(to_wide_string(key));
        block.push(u16::from(b'='));
        block.extend(to_wide_string(value));
        block.push(0);
    }
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);
    block
}

/// Create a job that kills its processes when the last handle closes.
///
/// Returns `None` if the job cannot be created; the child then runs without
/// one and `kill` falls back to `TerminateProcess`.
fn create_job_object() -> Option<OwnedHandle> {
    // SAFETY: null parameters create an unnamed job with default security.
    let job = unsafe { CreateJobObjectW(ptr::null(), ptr::null()) };
    if job.is_null() {
        return None;
    }

    // SAFETY: plain data structure.
    let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { std::mem::zeroed() };
    info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

    // SAFETY: job handle and info are valid for the duration of the call.
    let result = unsafe {
        SetInformationJobObject(
            job,
            JobObjectExtendedLimitInformation,
            (&raw const info).cast(),
            std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
        )
    };

    if result == FALSE {
        // SAFETY: job handle is valid and not yet owned.
        unsafe {
            CloseHandle(job);
        }
        return None;
    }

    // SAFETY: job is a valid handle we own.
    Some(unsafe { OwnedHandle::from_raw_handle(job as RawHandle) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(arg: &str) -> String {
        String::from_utf16_lossy(&escape_argument(OsStr::new(arg)))
    }

    #[test]
    fn plain_argument_is_untouched() {
        assert_eq!(escaped("hello"), "hello");
    }

    #[test]
    fn whitespace_and_empty_are_quoted() {
        assert_eq!(escaped("hello world"), "\"hello world\"");
        assert_eq!(escaped("a\tb"), "\"a\tb\"");
        assert_eq!(escaped(""), "\"\"");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        assert_eq!(escaped("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn backslashes_are_literal_except_before_quotes() {
        assert_eq!(escaped("C:\\Users\\test"), "\"C:\\Users\\test\"");
        assert_eq!(escaped("C:\\Users\\"), "\"C:\\Users\\\\\"");
        assert_eq!(escaped("a\\\"b"), "\"a\\\\\\\"b\"");
    }

    #[test]
    fn environment_block_is_double_terminated() {
        let mut env = std::collections::HashMap::new();
        env.insert(OsString::from("B"), OsString::from("2"));
        env.insert(OsString::from("A"), OsString::from("1"));

        let block = String::from_utf16_lossy(&build_environment_block(&env));
        assert_eq!(block, "A=1\0B=2\0\0");
    }

    #[test]
    fn empty_environment_block() {
        let block = build_environment_block(&std::collections::HashMap::new());
        assert_eq!(block, vec![0, 0]);
    }
}
