use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::registry::{Registry, SharedRegistry};
use crate::sched::{SCHED_DEADLINE, SchedAttr, SchedQuery};

use super::{Control, Result};

/// Counters of one manage round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManageReport {
    /// Nodes newly bound to a configuration entry.
    pub bound: usize,
    pub sampled: usize,
    pub failed: usize,
}

/// Periodic consumer of the registry.
///
/// Retries configuration lookup for unbound nodes and samples the on-cpu time
/// of every node into its statistics.
pub struct ManageTask {
    registry: SharedRegistry,
    query: Arc<dyn SchedQuery>,
    control: Arc<Control>,
    /// Flags of tasks that must stop together with this one on failure.
    peers: Vec<Arc<Control>>,
    interval: Duration,
}

impl ManageTask {
    pub fn new(
        registry: SharedRegistry,
        query: Arc<dyn SchedQuery>,
        control: Arc<Control>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            query,
            control,
            peers: Vec::new(),
            interval,
        }
    }

    /// Stops `peer` as well when a round fails.
    pub fn stop_on_failure(mut self, peer: Arc<Control>) -> Self {
        self.peers.push(peer);
        self
    }

    /// Runs one round under the registry lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot grow or its lock is poisoned.
    pub fn step(&self) -> Result<ManageReport> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();

        let mut guard = self.registry.lock()?;
        let mut report = ManageReport {
            bound: guard.resolve_unbound()?,
            ..ManageReport::default()
        };

        let Registry { nodes, config } = &mut *guard;
        for node in nodes.nodes_mut() {
            let budget = node
                .param
                .and_then(|id| config.config(id))
                .map_or(0, |param| self.budget(&param.attr));
            match self.query.get_runtime(node.pid) {
                Ok(total) => {
                    node.stats.update_runtime(total, timestamp, budget);
                    report.sampled += 1;
                }
                Err(err) => {
                    log::trace!("no runtime for pid {}: {err}", node.pid);
                    node.stats.record_failure();
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// On-cpu time a deadline task may use within one manage interval.
    fn budget(&self, attr: &SchedAttr) -> u64 {
        if attr.policy != SCHED_DEADLINE || attr.period == 0 {
            return 0;
        }
        let interval = self.interval.as_nanos();
        let budget = u128::from(attr.runtime) * interval / u128::from(attr.period);
        u64::try_from(budget).unwrap_or(u64::MAX)
    }

    /// Loops until the control flag is stopped.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of [`ManageTask::step`]; the task's own
    /// flag and those registered through [`ManageTask::stop_on_failure`] are
    /// stopped before returning.
    pub fn run(self) -> Result<()> {
        log::info!("manage task started");
        while !self.control.is_stopped() {
            let report = match self.step() {
                Ok(report) => report,
                Err(err) => {
                    log::error!("manage task failed: {err}");
                    self.control.stop();
                    self.peers.iter().for_each(|peer| peer.stop());
                    return Err(err);
                }
            };
            if report.bound > 0 || report.failed > 0 {
                log::debug!(
                    "manage round: {} bound, {} sampled, {} failed",
                    report.bound,
                    report.sampled,
                    report.failed
                );
            }
            std::thread::sleep(self.interval);
        }
        log::info!("manage task stopped");
        Ok(())
    }
}
