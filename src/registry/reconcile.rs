//! One reconciliation pass: a sorted merge of freshly observed pids into the
//! tracked node list.

use std::cmp::Ordering;

use crate::Pid;
use crate::sched::{SCHED_RR, SchedQuery, policy_is_realtime, policy_to_string};

use super::{ConfigStore, Cursor, Error, Label, Node, NodeStore, Result, find_params};

/// A process reported by the pid enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPid {
    pub pid: Pid,
    pub psig: Option<String>,
    pub contid: Option<String>,
}

impl ObservedPid {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            psig: None,
            contid: None,
        }
    }
}

/// Counters of one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub inserted: usize,
    pub dropped: usize,
    pub unchanged: usize,
    /// Inserted nodes that were bound to a configuration entry.
    pub bound: usize,
}

impl PassReport {
    pub fn is_unchanged(&self) -> bool {
        self.inserted == 0 && self.dropped == 0
    }
}

/// Merges `observed` into `nodes`.
///
/// `observed` may arrive in any order; it is sorted and duplicate pids are
/// dropped first. Afterwards `nodes` holds exactly the observed pids in
/// ascending order. Nodes of pids seen before are kept as they are, new ones are
/// defaulted, filled from `query` and bound through [`find_params`]. An empty
/// `observed` drops every node.
///
/// # Errors
///
/// Returns [`Error::Allocation`] if a node or placeholder cannot be stored. The
/// list is still sorted but the pass is incomplete.
pub fn reconcile(
    nodes: &mut NodeStore,
    config: &mut ConfigStore,
    mut observed: Vec<ObservedPid>,
    query: &dyn SchedQuery,
) -> Result<PassReport> {
    observed.sort_by_key(|entry| entry.pid);
    observed.dedup_by_key(|entry| entry.pid);

    let mut report = PassReport::default();
    let mut prev = Cursor::HEAD;
    let mut incoming = observed.into_iter().peekable();

    loop {
        let order = match (incoming.peek(), nodes.after(prev)) {
            (Some(next), Some(tracked)) => next.pid.cmp(&tracked.pid),
            _ => break,
        };

        match order {
            Ordering::Less => {
                if let Some(entry) = incoming.next() {
                    report.bound += usize::from(insert(nodes, config, &mut prev, entry, query)?);
                    report.inserted += 1;
                }
            }
            Ordering::Greater => {
                if let Some(pid) = nodes.drop_after(prev) {
                    log::debug!("dropping pid {pid}");
                    report.dropped += 1;
                }
            }
            Ordering::Equal => {
                incoming.next();
                if let Some(cursor) = nodes.advance(prev) {
                    prev = cursor;
                }
                report.unchanged += 1;
            }
        }
    }

    for entry in incoming {
        report.bound += usize::from(insert(nodes, config, &mut prev, entry, query)?);
        report.inserted += 1;
    }

    while let Some(pid) = nodes.drop_after(prev) {
        log::debug!("dropping pid {pid} at end");
        report.dropped += 1;
    }

    Ok(report)
}

/// Inserts `entry` behind `prev`. Returns whether the node was bound.
fn insert(
    nodes: &mut NodeStore,
    config: &mut ConfigStore,
    prev: &mut Cursor,
    entry: ObservedPid,
    query: &dyn SchedQuery,
) -> Result<bool> {
    log::debug!("inserting pid {}", entry.pid);
    let node = nodes.insert_after(
        prev,
        entry.pid,
        entry.psig.map(Label::from),
        entry.contid.map(Label::from),
    )?;
    read_sched_info(node, query);

    match find_params(node, config) {
        Ok(_) => Ok(true),
        Err(Error::NotFound) => {
            log::debug!("no configuration for pid {}", node.pid);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn read_sched_info(node: &mut Node, query: &dyn SchedQuery) {
    match query.get_sched_attr(node.pid) {
        Ok(attr) => node.attr = attr,
        Err(err) => {
            log::debug!("could not read scheduling attributes of pid {}: {err}", node.pid);
            return;
        }
    }
    if policy_is_realtime(node.attr.policy) {
        log::info!(
            "pid {} already runs {} at priority {}",
            node.pid,
            policy_to_string(node.attr.policy),
            node.attr.priority
        );
    }
    if node.attr.policy == SCHED_RR {
        match query.get_rr_interval(node.pid) {
            Ok(interval) => node.rr_interval = interval,
            Err(err) => log::debug!("could not read rr interval of pid {}: {err}", node.pid),
        }
    }
}
