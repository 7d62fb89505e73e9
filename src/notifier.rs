//! Desktop notification with kill/ignore/mercy actions

use async_trait::async_trait;
use notify_rust::{Notification, Timeout};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CpuAlert {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
}

/// What the operator chose to do about an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Kill,
    /// Ignore this pid for the rest of the run.
    Ignore,
    /// Mercy, closed, or timed out. All handled the same way.
    Dismissed,
}

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: CpuAlert) -> Decision;
}

pub struct DesktopNotifier {
    wait: Duration,
}

impl DesktopNotifier {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl AlertNotifier for DesktopNotifier {
    async fn notify(&self, alert: CpuAlert) -> Decision {
        let timeout = Timeout::Milliseconds(self.wait.as_millis() as u32);
        // wait_for_action blocks on the notification daemon, so keep it off
        // the watch loop's thread.
        let shown = tokio::task::spawn_blocking(move || {
            let handle = Notification::new()
                .summary("Should I kill it?")
                .body(&format!(
                    "{} (pid {}) is consuming {:.0}% of your CPU",
                    alert.name, alert.pid, alert.cpu_percent
                ))
                .appname("hogwatch")
                .action("kill", "Kill it!")
                .action("ignore", "Ignore it from now on")
                .action("default", "Show mercy")
                .timeout(timeout)
                .show()?;

            let mut decision = Decision::Dismissed;
            handle.wait_for_action(|action| {
                decision = match action {
                    "kill" => Decision::Kill,
                    "ignore" => Decision::Ignore,
                    _ => Decision::Dismissed,
                };
            });
            Ok::<_, notify_rust::error::Error>(decision)
        })
        .await;

        match shown {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!("Failed to show notification: {}", e);
                Decision::Dismissed
            }
            Err(e) => {
                warn!("Notification task failed: {}", e);
                Decision::Dismissed
            }
        }
    }
}
