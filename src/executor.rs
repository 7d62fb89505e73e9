//! Process termination built on kill(2)

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    Terminated,
    /// The target exited between resolution and termination.
    AlreadyGone,
}

#[derive(Debug, Error)]
pub enum KillError {
    #[error("permission denied sending SIGTERM to pid {0}")]
    PermissionDenied(u32),
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        source: std::io::Error,
    },
}

pub trait ProcessKiller: Send + Sync {
    fn terminate(&self, pid: u32) -> Result<KillOutcome, KillError>;
}

/// Sends SIGTERM directly. "No such process" is treated as success since the
/// pid may have exited on its own.
pub struct SignalKiller;

impl ProcessKiller for SignalKiller {
    fn terminate(&self, pid: u32) -> Result<KillOutcome, KillError> {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result == 0 {
            info!("Sent SIGTERM to pid {}", pid);
            return Ok(KillOutcome::Terminated);
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => {
                debug!("Pid {} was already gone", pid);
                Ok(KillOutcome::AlreadyGone)
            }
            Some(libc::EPERM) => Err(KillError::PermissionDenied(pid)),
            _ => Err(KillError::Signal { pid, source: err }),
        }
    }
}
