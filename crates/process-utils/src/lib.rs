//! Child-process helpers shared by the probe and the CLI.

use std::ffi::OsStr;
use std::io;
use std::process::Stdio;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `std::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Check that `program` can be launched at all.
///
/// The program is spawned with all standard streams detached and killed right
/// away, so it does not matter whether it understands any arguments. Only a
/// failure to spawn (typically `NotFound`) is reported.
pub fn probe_program(program: impl AsRef<OsStr>) -> io::Result<()> {
    let mut child = std_command(program)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    // The child may already be gone; either way it must be reaped.
    let _ = child.kill();
    child.wait()?;
    Ok(())
}

#[cfg(feature = "tokio")]
mod async_process {
    use std::process::ExitStatus;
    use std::time::Duration;

    use super::*;

    impl NoWindowExt for tokio::process::Command {
        fn no_window(&mut self) {
            #[cfg(windows)]
            {
                use std::os::windows::process::CommandExt;
                self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
            }
        }
    }

    /// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
    pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(program);
        cmd.no_window();
        cmd
    }

    /// Kill a child and wait for it to be reaped.
    ///
    /// Safe to call on a child that has already exited. Returns the exit
    /// status, or `None` when the wait failed or did not finish within
    /// `timeout` (the child is then left to `kill_on_drop`).
    pub async fn terminate(
        child: &mut tokio::process::Child,
        timeout: Duration,
    ) -> Option<ExitStatus> {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        let _ = child.start_kill();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

#[cfg(feature = "tokio")]
pub use async_process::{terminate, tokio_command};
