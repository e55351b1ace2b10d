//! Starting a child on the slave side of a PTY.

use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::PtyConfig;
use crate::error::{PtyError, Result};
use crate::process::ProcessChild;

/// Spawn `program` with the PTY slave as its standard streams.
///
/// With `config.new_session` the child calls `setsid` and adopts the slave as
/// its controlling terminal, so job control and `SIGWINCH` behave as in a
/// real terminal, and it leads its own process group.
pub fn spawn_child(
    slave: OwnedFd,
    program: &OsStr,
    args: &[OsString],
    config: &PtyConfig,
) -> Result<ProcessChild> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.envs(&config.env);
    cmd.kill_on_drop(true);

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
    cmd.stdout(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
    cmd.stderr(Stdio::from(slave));

    if config.new_session {
        // SAFETY: setsid and ioctl are async-signal-safe. The closure runs
        // after the standard streams were redirected, so fd 0 is the slave.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    Ok(ProcessChild::new(child, config.new_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ExitStatus, PtyChild};
    use crate::unix::pty::{UnixPtyMaster, open_slave};

    #[tokio::test]
    async fn child_exit_code_is_reported() {
        let (_master, path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&path).unwrap();
        let args = [OsString::from("-c"), OsString::from("exit 3")];

        let mut child = spawn_child(slave, OsStr::new("sh"), &args, &PtyConfig::default()).unwrap();
        assert_eq!(child.wait().await.unwrap(), ExitStatus::Exited(3));
    }

    #[tokio::test]
    async fn working_directory_is_applied() {
        let (_master, path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&path).unwrap();
        let config = PtyConfig::builder().working_directory("/").build();
        let args = [OsString::from("-c"), OsString::from("test \"$(pwd)\" = /")];

        let mut child = spawn_child(slave, OsStr::new("sh"), &args, &config).unwrap();
        assert!(child.wait().await.unwrap().success());
    }
}
