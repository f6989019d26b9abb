//! In-memory model of tracked processes and their desired configuration.
//!
//! [`Registry`] combines the runtime [`NodeStore`] with the [`ConfigStore`].
//! Tasks share it as a [`SharedRegistry`] and hold the lock for a complete
//! reconciliation pass or event application.

mod config;
mod error;
mod events;
mod label;
mod node;
mod reconcile;
mod resolver;

use std::sync::{Arc, Mutex};

pub use config::{ConfigStore, Container, PidAssoc, PidConfig, PidConfigId};
pub use error::{Error, Result};
pub use events::{ContainerEvent, EventKind, EventOutcome, apply_event};
pub use label::Label;
pub use node::{Cursor, Iter, Node, NodeStore};
pub use reconcile::{ObservedPid, PassReport, reconcile};
pub use resolver::find_params;

use crate::Pid;
use crate::sched::SchedQuery;

/// Registry shared between tasks.
pub type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(Debug, Default)]
pub struct Registry {
    pub nodes: NodeStore,
    pub config: ConfigStore,
}

impl Registry {
    pub fn new(config: ConfigStore) -> Self {
        Self {
            nodes: NodeStore::new(),
            config,
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Runs one reconciliation pass and evicts removed containers no node
    /// refers to any more.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Allocation`] from [`reconcile`].
    pub fn reconcile(&mut self, observed: Vec<ObservedPid>, query: &dyn SchedQuery) -> Result<PassReport> {
        let report = reconcile(&mut self.nodes, &mut self.config, observed, query)?;
        self.config.collect_removed(&self.nodes);
        Ok(report)
    }

    /// Applies a container event. A container that becomes active again is
    /// offered to the nodes still waiting for a configuration.
    ///
    /// # Errors
    ///
    /// See [`apply_event`] and [`Registry::resolve_unbound`].
    pub fn apply_event(&mut self, event: &ContainerEvent) -> Result<EventOutcome> {
        let outcome = apply_event(&mut self.config, event)?;
        if matches!(outcome, EventOutcome::Created | EventOutcome::Revived) {
            self.resolve_unbound()?;
        }
        Ok(outcome)
    }

    /// Retries [`find_params`] for every node without configuration. Returns
    /// the number of nodes bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if a placeholder cannot be stored.
    pub fn resolve_unbound(&mut self) -> Result<usize> {
        let mut bound = 0;
        for node in self.nodes.nodes_mut().filter(|node| node.param.is_none()) {
            match find_params(node, &mut self.config) {
                Ok(_) => bound += 1,
                Err(Error::NotFound) => {}
                Err(err) => return Err(err),
            }
        }
        if bound > 0 {
            log::debug!("bound {bound} nodes to configuration");
        }
        Ok(bound)
    }

    /// Configuration entry bound to `pid`.
    pub fn param_of(&self, pid: Pid) -> Option<&PidConfig> {
        let id = self.nodes.get(pid)?.param?;
        self.config.config(id)
    }
}
