//! Periodic top-process watch loop

use crate::collector::{ProcessCollector, ProcessInfo};
use crate::executor::{KillError, ProcessKiller};
use crate::matcher::IgnoreList;
use crate::notifier::{AlertNotifier, CpuAlert, Decision};
use crate::sampler::Sampler;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How long a notification may sit unanswered before it counts as dismissed.
pub const NOTIFY_WAIT: Duration = Duration::from_secs(50);

/// Pid plus start time, so a recycled pid doesn't inherit the previous
/// occupant's debounce progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcessIdentity {
    pid: u32,
    start_time: u64,
}

impl From<&ProcessInfo> for ProcessIdentity {
    fn from(p: &ProcessInfo) -> Self {
        Self {
            pid: p.pid,
            start_time: p.start_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchPolicy {
    /// Strictly above this CPU share, the top process qualifies for an alert.
    pub alert_threshold: f64,
    /// Strictly above this share, it is killed on sight. 0 disables.
    pub kill_limit: f64,
    /// Alert for ignored processes too, instead of staying silent.
    pub alert_ignored: bool,
}

enum TickAction {
    Nothing,
    KillOnSight,
    /// First qualifying tick; remember the identity and wait one more.
    Arm(ProcessIdentity),
    Notify,
}

pub struct Watcher<C, N, K> {
    sampler: Sampler<C>,
    notifier: N,
    killer: K,
    ignore: IgnoreList,
    policy: WatchPolicy,
    last_alerted: Option<ProcessIdentity>,
}

impl<C, N, K> Watcher<C, N, K>
where
    C: ProcessCollector,
    N: AlertNotifier,
    K: ProcessKiller,
{
    pub fn new(collector: C, notifier: N, killer: K, ignore: IgnoreList, policy: WatchPolicy) -> Self {
        Self {
            sampler: Sampler::new(collector),
            notifier,
            killer,
            ignore,
            policy,
            last_alerted: None,
        }
    }

    /// Run forever, checking the top process every `every`. Ticks that would
    /// land while a notification is awaiting its answer are skipped.
    pub async fn run(mut self, every: Duration) {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick fires immediately; spend it opening the CPU
        // sampling window instead of classifying lifetime averages.
        ticker.tick().await;
        self.sampler.prime();
        info!(
            "Watching: alert above {}%, kill above {}%",
            self.policy.alert_threshold, self.policy.kill_limit
        );

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One poll: sample, classify, act. Public so the loop can be driven
    /// tick by tick.
    pub async fn tick(&mut self) {
        let Some(top) = self.sampler.top() else {
            return;
        };
        debug!(
            "Top process is {} (pid {}) at {:.1}%",
            top.name, top.pid, top.cpu_percent
        );

        match self.classify(&top) {
            TickAction::Nothing => {}
            TickAction::Arm(identity) => {
                debug!("{} crossed the alert line, watching for a repeat", top.name);
                self.last_alerted = Some(identity);
            }
            TickAction::KillOnSight => {
                info!(
                    "{} (pid {}) crossed the kill limit at {:.1}%",
                    top.name, top.pid, top.cpu_percent
                );
                self.terminate(top.pid);
            }
            TickAction::Notify => {
                let alert = CpuAlert {
                    pid: top.pid,
                    name: top.name.clone(),
                    cpu_percent: top.cpu_percent,
                };
                // Suspends the loop: no sampling until the operator answers
                // or the wait expires.
                let decision = match time::timeout(NOTIFY_WAIT, self.notifier.notify(alert)).await {
                    Ok(decision) => decision,
                    Err(_) => Decision::Dismissed,
                };
                self.settle(decision, &top);
            }
        }
    }

    fn classify(&mut self, top: &ProcessInfo) -> TickAction {
        let identity = ProcessIdentity::from(top);

        if top.cpu_percent <= self.policy.alert_threshold {
            // Dropping below the line makes the process eligible for a fresh
            // first-breach alert, but only once something else takes the top
            // slot.
            if self.last_alerted.is_some_and(|prev| prev != identity) {
                self.last_alerted = None;
            }
            return TickAction::Nothing;
        }

        let ignored = self.ignore.is_ignored(&top.name, top.pid);
        if ignored && !self.policy.alert_ignored {
            debug!("{} is on the ignore list", top.name);
            return TickAction::Nothing;
        }

        // Ignored processes are never killed automatically, even with
        // alert_ignored set; they only get the notification path.
        if !ignored && self.policy.kill_limit > 0.0 && top.cpu_percent > self.policy.kill_limit {
            return TickAction::KillOnSight;
        }

        if self.last_alerted == Some(identity) {
            TickAction::Notify
        } else {
            TickAction::Arm(identity)
        }
    }

    fn settle(&mut self, decision: Decision, top: &ProcessInfo) {
        match decision {
            Decision::Kill => self.terminate(top.pid),
            Decision::Ignore => {
                info!("Ignoring pid {} ({}) from now on", top.pid, top.name);
                self.ignore.push_pid(top.pid);
            }
            Decision::Dismissed => {
                debug!("Alert for {} dismissed", top.name);
            }
        }
        // Every outcome restarts the two-tick debounce.
        self.last_alerted = None;
    }

    fn terminate(&mut self, pid: u32) {
        match self.killer.terminate(pid) {
            Ok(_) => {}
            Err(KillError::PermissionDenied(pid)) => {
                error!("Not allowed to kill pid {}", pid);
            }
            Err(e) => warn!("{}", e),
        }
    }
}
