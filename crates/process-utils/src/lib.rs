//! Small process-related helpers shared across the workspace.

use std::ffi::OsStr;
use std::fmt;
use std::process::ExitStatus;

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

#[cfg(feature = "tokio")]
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
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited with status code 0.
    Success,
    /// Exited with a non-zero status code.
    Failed(i32),
    /// Terminated by a signal (Unix) or without a status code.
    Terminated(Option<i32>),
    /// Killed because the caller asked for it.
    Cancelled,
    /// The exit status could not be collected.
    Unknown,
}

impl ProcessExit {
    /// Classify a collected exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => Self::Success,
            Some(code) => Self::Failed(code),
            None => Self::Terminated(signal_of(&status)),
        }
    }

    /// `true` for a zero exit or a requested stop.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Success | Self::Cancelled)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "exited successfully"),
            Self::Failed(code) => write!(f, "exited with code {code}"),
            Self::Terminated(Some(sig)) => write!(f, "terminated by signal {sig}"),
            Self::Terminated(None) => write!(f, "terminated without an exit code"),
            Self::Cancelled => write!(f, "stopped on request"),
            Self::Unknown => write!(f, "exit status unavailable"),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Spawn a task that waits for `child` to exit and reports how it ended.
///
/// Cancelling `cancellation_token` kills the child; the receiver then gets
/// [`ProcessExit::Cancelled`]. The kill is issued without waiting on the
/// caller's side.
#[cfg(feature = "tokio")]
pub fn spawn_exit_waiter(
    mut child: tokio::process::Child,
    cancellation_token: tokio_util::sync::CancellationToken,
) -> tokio::sync::oneshot::Receiver<ProcessExit> {
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        // An exit that happened before the cancel wins over the cancel.
        let exit = tokio::select! {
            biased;
            status = child.wait() => classify_wait(status),
            _ = cancellation_token.cancelled() => match child.try_wait() {
                Ok(Some(status)) => classify_wait(Ok(status)),
                _ => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill process: {}", e);
                    }
                    ProcessExit::Cancelled
                }
            },
        };
        let _ = tx.send(exit);
    });

    rx
}

#[cfg(feature = "tokio")]
fn classify_wait(status: std::io::Result<ExitStatus>) -> ProcessExit {
    match status {
        Ok(exit_status) => {
            let exit = ProcessExit::from_status(exit_status);
            if !exit.is_clean() {
                tracing::warn!("Process {}", exit);
            }
            exit
        }
        Err(e) => {
            tracing::error!("Error waiting for process: {}", e);
            ProcessExit::Unknown
        }
    }
}
