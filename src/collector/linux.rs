use super::{ProcessCollector, ProcessInfo};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

// TCP_LISTEN in /proc/net/tcp state column
const LISTEN_STATE: &str = "0A";

#[derive(Clone)]
struct CpuSample {
    total_ticks: u64, // utime + stime
    timestamp: Instant,
}

pub struct LinuxProcessCollector {
    clock_ticks: u64,
    boot_time: u64,
    cpu_samples: Mutex<HashMap<u32, CpuSample>>,
}

impl LinuxProcessCollector {
    pub fn new() -> Self {
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) as u64 }.max(1);
        Self {
            clock_ticks,
            boot_time: Self::get_boot_time(),
            cpu_samples: Mutex::new(HashMap::new()),
        }
    }

    fn get_boot_time() -> u64 {
        let stat = fs::read_to_string("/proc/stat").unwrap_or_default();
        for line in stat.lines() {
            if let Some(rest) = line.strip_prefix("btime ") {
                return rest.trim().parse().unwrap_or(0);
            }
        }
        0
    }

    fn parse_process(&self, pid: u32) -> Option<ProcessInfo> {
        let proc_dir = Path::new("/proc").join(pid.to_string());
        let stat_content = fs::read_to_string(proc_dir.join("stat")).ok()?;

        // comm is parenthesized and may itself contain spaces or parens
        let open = stat_content.find('(')?;
        let close = stat_content.rfind(')')?;
        let name = stat_content.get(open + 1..close)?.to_string();
        let rest: Vec<&str> = stat_content.get(close + 1..)?.split_whitespace().collect();
        if rest.len() < 20 {
            return None;
        }

        let utime: u64 = rest[11].parse().unwrap_or(0);
        let stime: u64 = rest[12].parse().unwrap_or(0);
        let start_time_ticks: u64 = rest[19].parse().unwrap_or(0);

        let total_ticks = utime + stime;
        let now_instant = Instant::now();
        let start_time = self.boot_time + (start_time_ticks / self.clock_ticks);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let cpu_percent = {
            let mut samples = self.cpu_samples.lock().unwrap();
            let percent = match samples.get(&pid) {
                Some(prev) => {
                    let tick_delta = total_ticks.saturating_sub(prev.total_ticks);
                    let time_delta = now_instant.duration_since(prev.timestamp).as_secs_f64();
                    if time_delta > 0.0 {
                        let cpu_seconds = tick_delta as f64 / self.clock_ticks as f64;
                        (cpu_seconds / time_delta) * 100.0
                    } else {
                        0.0
                    }
                }
                None => {
                    // First observation: fall back to the lifetime average so
                    // one-shot queries still see a meaningful number.
                    let age = now.saturating_sub(start_time);
                    if age > 0 {
                        (total_ticks as f64 / self.clock_ticks as f64) / age as f64 * 100.0
                    } else {
                        0.0
                    }
                }
            };
            samples.insert(
                pid,
                CpuSample {
                    total_ticks,
                    timestamp: now_instant,
                },
            );
            percent
        };

        let cmdline = fs::read_to_string(proc_dir.join("cmdline"))
            .unwrap_or_default()
            .replace('\0', " ")
            .trim()
            .to_string();

        Some(ProcessInfo {
            pid,
            name,
            cmdline,
            cpu_percent,
            start_time,
        })
    }

    /// Remove CPU samples for processes that no longer exist.
    fn cleanup_stale(&self, active_pids: &[u32]) {
        let mut samples = self.cpu_samples.lock().unwrap();
        samples.retain(|pid, _| active_pids.contains(pid));
    }

    /// Socket inode of the LISTEN entry bound to `port`, from /proc/net/tcp{,6}.
    fn listening_inode(port: u16) -> Option<u64> {
        for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
            let Ok(content) = fs::read_to_string(table) else {
                continue;
            };
            for line in content.lines().skip(1) {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() < 10 || fields[3] != LISTEN_STATE {
                    continue;
                }
                let Some(port_hex) = fields[1].rsplit(':').next() else {
                    continue;
                };
                match u16::from_str_radix(port_hex, 16) {
                    Ok(local_port) if local_port == port => {}
                    _ => continue,
                }
                if let Ok(inode) = fields[9].parse::<u64>() {
                    if inode != 0 {
                        return Some(inode);
                    }
                }
            }
        }
        None
    }

    /// Walk /proc/<pid>/fd looking for the process holding `inode`.
    fn pid_owning_inode(inode: u64) -> Option<u32> {
        let target = format!("socket:[{}]", inode);
        let entries = fs::read_dir("/proc").ok()?;
        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                if let Ok(link) = fs::read_link(fd.path()) {
                    if link.to_string_lossy() == target {
                        return Some(pid);
                    }
                }
            }
        }
        None
    }
}

impl Default for LinuxProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessCollector for LinuxProcessCollector {
    fn list_processes(&self) -> Vec<ProcessInfo> {
        let mut processes = Vec::new();
        match fs::read_dir("/proc") {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Some(name) = entry.file_name().to_str() {
                        if let Ok(pid) = name.parse::<u32>() {
                            if let Some(info) = self.parse_process(pid) {
                                processes.push(info);
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Failed to enumerate /proc: {}", e);
                return Vec::new();
            }
        }
        let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
        self.cleanup_stale(&pids);
        processes
    }

    fn get_process(&self, pid: u32) -> Option<ProcessInfo> {
        self.parse_process(pid)
    }

    fn find_by_port(&self, port: u16) -> Option<ProcessInfo> {
        let inode = Self::listening_inode(port)?;
        let pid = Self::pid_owning_inode(inode)?;
        self.parse_process(pid)
    }
}
