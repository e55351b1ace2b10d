//! Child handle backed by a `tokio::process::Child`.
//!
//! Used by the Unix PTY strategy and by the pipe fallback on every platform.
//! Reaping always goes through tokio so its SIGCHLD driver stays the only
//! caller of `waitpid` for these pids.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::process::Child;

use crate::error::{PtyError, Result};
use crate::traits::{ExitStatus, PtyChild};

/// A spawned process and its cached exit status.
pub struct ProcessChild {
    child: Child,
    pid: Option<u32>,
    /// Whether the child leads its own process group.
    group_leader: bool,
    status: Option<ExitStatus>,
}

impl std::fmt::Debug for ProcessChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChild")
            .field("pid", &self.pid)
            .field("group_leader", &self.group_leader)
            .field("status", &self.status)
            .finish()
    }
}

impl ProcessChild {
    /// Wrap a freshly spawned child.
    ///
    /// `group_leader` must only be set when the child was started in a new
    /// session or process group whose id equals its pid.
    #[must_use]
    pub fn new(child: Child, group_leader: bool) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            group_leader,
            status: None,
        }
    }

    async fn wait_inner(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = ExitStatus::from(self.child.wait().await.map_err(PtyError::Wait)?);
        self.status = Some(status);
        Ok(status)
    }

    #[cfg(unix)]
    fn kill_group(&self) -> io::Result<()> {
        let pgid = self
            .pid
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "child has no pid"))?;
        kill_process_group(pgid)
    }
}

/// Send `SIGKILL` to every process in group `pgid`.
///
/// Works without the child's handle, e.g. while another task holds it. A
/// group that no longer exists is not an error.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    use rustix::process::{Pid, Signal};

    let pid = i32::try_from(pgid)
        .ok()
        .and_then(Pid::from_raw)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid process group"))?;

    match rustix::process::kill_process_group(pid, Signal::KILL) {
        Ok(()) | Err(rustix::io::Errno::SRCH) => Ok(()),
        Err(e) => Err(io::Error::from_raw_os_error(e.raw_os_error())),
    }
}

impl PtyChild for ProcessChild {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ExitStatus>> + Send + '_>> {
        Box::pin(self.wait_inner())
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.status {
            return Ok(Some(status));
        }
        let status = self
            .child
            .try_wait()
            .map_err(PtyError::Wait)?
            .map(ExitStatus::from);
        self.status = status;
        Ok(status)
    }

    fn process_group(&self) -> Option<u32> {
        if self.group_leader { self.pid } else { None }
    }

    fn kill(&mut self) -> Result<()> {
        if self.status.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        if self.group_leader {
            if let Err(e) = self.kill_group() {
                tracing::debug!(pid = ?self.pid, error = %e, "process group kill failed");
            }
        }

        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already exited but not yet reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(PtyError::Signal(e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    async fn wait_reports_exit_code() {
        let child = Command::new("sh").args(["-c", "exit 4"]).spawn().unwrap();
        let mut child = ProcessChild::new(child, false);

        let status = child.wait().await.unwrap();
        assert_eq!(status, ExitStatus::Exited(4));
        // Cached after the first reap.
        assert_eq!(child.try_wait().unwrap(), Some(ExitStatus::Exited(4)));
    }

    #[tokio::test]
    async fn kill_terminates_long_running_child() {
        let child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let mut child = ProcessChild::new(child, true);
        assert!(child.pid().is_some());
        assert_eq!(child.try_wait().unwrap(), None);

        child.kill().unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));

        // Killing a reaped child is a no-op.
        child.kill().unwrap();
    }

    #[tokio::test]
    async fn kill_process_group_by_id() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pgid = child.id().unwrap();

        kill_process_group(pgid).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());

        // The group is gone now.
        kill_process_group(pgid).unwrap();
        assert!(kill_process_group(0).is_err());
    }
}
