//! Top-CPU sampling over the process table

use crate::collector::{ProcessCollector, ProcessInfo};
use tracing::debug;

pub struct Sampler<C> {
    collector: C,
}

impl<C: ProcessCollector> Sampler<C> {
    pub fn new(collector: C) -> Self {
        Self { collector }
    }

    /// One throwaway pass so the next listing has a CPU delta window.
    pub fn prime(&self) {
        let _ = self.collector.list_processes();
    }

    /// The process with the highest CPU share right now, or `None` when the
    /// table could not be read. Ties keep the later table entry.
    pub fn top(&self) -> Option<ProcessInfo> {
        let top = self
            .collector
            .list_processes()
            .into_iter()
            .max_by(|a, b| a.cpu_percent.total_cmp(&b.cpu_percent));
        if top.is_none() {
            debug!("Process table came back empty, skipping sample");
        }
        top
    }

    /// Top `n` processes by CPU share, descending.
    pub fn top_n(&self, n: usize) -> Vec<ProcessInfo> {
        let mut processes = self.collector.list_processes();
        processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        processes.truncate(n);
        processes
    }
}
