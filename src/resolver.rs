//! On-demand target resolution and termination

use crate::collector::{ProcessCollector, ProcessInfo};
use crate::executor::{KillOutcome, ProcessKiller};
use crate::matcher::Matcher;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// What the user asked to kill: a pid, a `:port`, or a name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillTarget {
    Pid(u32),
    Port(u16),
    Name(String),
}

#[derive(Debug, Error)]
pub enum TargetParseError {
    #[error("{0:?} is not a valid port")]
    InvalidPort(String),
    #[error("who's the target?")]
    Empty,
}

impl KillTarget {
    pub fn parse(raw: &str) -> Result<Self, TargetParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TargetParseError::Empty);
        }
        if let Ok(pid) = raw.parse::<u32>() {
            return Ok(KillTarget::Pid(pid));
        }
        if let Some(port) = raw.strip_prefix(':') {
            return port
                .parse::<u16>()
                .map(KillTarget::Port)
                .map_err(|_| TargetParseError::InvalidPort(raw.to_string()));
        }
        Ok(KillTarget::Name(raw.to_string()))
    }
}

/// Yes/no question put to the operator before risky kills.
pub trait Prompt: Send + Sync {
    fn confirm(&self, question: &str, default_yes: bool) -> bool;
}

pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, question: &str, default_yes: bool) -> bool {
        print!("{} ", question);
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        let answer = line.trim();
        if default_yes {
            !answer.starts_with(['n', 'N'])
        } else {
            answer.starts_with(['y', 'Y'])
        }
    }
}

pub struct KillResolver<C, K, P> {
    collector: C,
    killer: Arc<K>,
    prompt: P,
    /// Answer yes to every question (the --yes flag).
    assume_yes: bool,
}

impl<C, K, P> KillResolver<C, K, P>
where
    C: ProcessCollector,
    K: ProcessKiller + 'static,
    P: Prompt,
{
    pub fn new(collector: C, killer: K, prompt: P, assume_yes: bool) -> Self {
        Self {
            collector,
            killer: Arc::new(killer),
            prompt,
            assume_yes,
        }
    }

    /// Map a target to candidate processes. Name targets match the process
    /// name or command line as a substring, skipping our own invocations.
    pub fn resolve(&self, target: &KillTarget) -> Vec<ProcessInfo> {
        match target {
            KillTarget::Pid(pid) => {
                let candidate = self.collector.get_process(*pid).unwrap_or_else(|| ProcessInfo {
                    pid: *pid,
                    name: format!("pid {}", pid),
                    cmdline: String::new(),
                    cpu_percent: 0.0,
                    start_time: 0,
                });
                vec![candidate]
            }
            KillTarget::Port(port) => self.collector.find_by_port(*port).into_iter().collect(),
            KillTarget::Name(pattern) => {
                let matcher = Matcher::substring(pattern);
                let own_pid = std::process::id();
                self.collector
                    .list_processes()
                    .into_iter()
                    .filter(|p| p.pid != own_pid && !p.cmdline.contains(crate::daemon::DAEMON_FLAG))
                    .filter(|p| matcher.matches(&p.name, p.pid) || matcher.matches(&p.cmdline, p.pid))
                    .collect()
            }
        }
    }

    /// Resolve and kill, with the confirmation policy: a port owner gets a
    /// confirmation question, a plural match gets a listing and an explicit
    /// plural confirmation, a single pid/name match dies immediately.
    pub async fn execute(&self, target: &KillTarget) {
        let candidates = self.resolve(target);

        if candidates.is_empty() {
            println!("Could not find any target to kill.");
            return;
        }

        if let KillTarget::Port(port) = target {
            let candidate = &candidates[0];
            if !self.assume_yes {
                let question = format!(
                    "{} (pid {}) is using port {}. Should I kill it? (Y/n)",
                    candidate.name, candidate.pid, port
                );
                if !self.prompt.confirm(&question, true) {
                    return;
                }
            }
            self.kill_one(candidate);
            return;
        }

        if candidates.len() == 1 {
            self.kill_one(&candidates[0]);
            return;
        }

        for p in &candidates {
            println!("{:<8} {}", p.pid, p.name);
        }
        if !self.assume_yes {
            let question = format!(
                "I found {} processes. Should I kill them all? (y/N)",
                candidates.len()
            );
            if !self.prompt.confirm(&question, false) {
                return;
            }
        }
        self.kill_all(candidates).await;
    }

    fn kill_one(&self, candidate: &ProcessInfo) {
        match self.killer.terminate(candidate.pid) {
            Ok(KillOutcome::Terminated) => println!("Consider it done."),
            Ok(KillOutcome::AlreadyGone) => println!("{} was already gone.", candidate.name),
            Err(e) => eprintln!("{}", e),
        }
    }

    /// Independent terminations fired concurrently and joined before
    /// reporting.
    async fn kill_all(&self, candidates: Vec<ProcessInfo>) {
        println!("Killing them all...");
        let mut handles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let killer = Arc::clone(&self.killer);
            handles.push(tokio::spawn(async move {
                let result = killer.terminate(candidate.pid);
                (candidate, result)
            }));
        }

        let mut failed = 0usize;
        for handle in handles {
            match handle.await {
                Ok((candidate, Ok(outcome))) => {
                    if outcome == KillOutcome::AlreadyGone {
                        debug!("{} (pid {}) was already gone", candidate.name, candidate.pid);
                    }
                }
                Ok((_, Err(e))) => {
                    failed += 1;
                    eprintln!("{}", e);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Kill task failed: {}", e);
                }
            }
        }

        if failed == 0 {
            println!("Consider it done.");
        } else {
            println!("Done, but {} could not be killed.", failed);
        }
    }
}
