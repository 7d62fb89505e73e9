//! Background daemon lifecycle (spawn, discover, stop)

use crate::collector::ProcessCollector;
use std::io;
use std::process::{Command, Stdio};

/// Hidden flag that marks a background watch invocation in the process
/// table, so `start` and `stop` can find it.
pub const DAEMON_FLAG: &str = "--watch-daemon";

/// Pid of a running background copy, if any.
pub fn find_running<C: ProcessCollector>(collector: &C) -> Option<u32> {
    let own_pid = std::process::id();
    collector
        .list_processes()
        .into_iter()
        .find(|p| p.pid != own_pid && p.cmdline.contains(DAEMON_FLAG))
        .map(|p| p.pid)
}

/// Spawn a detached copy of the current executable with `args` and no
/// attached stdio. The child outlives this process.
pub fn spawn_detached(args: &[String]) -> io::Result<u32> {
    let exe = std::env::current_exe()?;
    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(child.id())
}
