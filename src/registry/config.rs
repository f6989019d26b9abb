//! Desired scheduling configuration: per-signature entries and containers.
//!
//! Entries are never removed from the flat list, so a [`PidConfigId`] stays
//! valid for the lifetime of the store. Containers hold association lists that
//! reference entries of the flat list.

use std::sync::Arc;

use crate::container::ContainerID;
use crate::sched::SchedAttr;

use super::{Error, NodeStore, Result};

/// Index of a [`PidConfig`] in the flat configuration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PidConfigId(usize);

impl PidConfigId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Desired configuration for processes with a given signature.
#[derive(Debug, Clone, Default)]
pub struct PidConfig {
    pub psig: Option<Arc<str>>,
    pub attr: SchedAttr,
    /// Container whose association list references this entry.
    pub container: Option<ContainerID>,
    /// Entry was created for a process without configuration.
    pub placeholder: bool,
}

impl PidConfig {
    pub fn new(psig: impl Into<Arc<str>>, attr: SchedAttr) -> Self {
        Self {
            psig: Some(psig.into()),
            attr,
            ..Self::default()
        }
    }
}

/// Reference from a container to an entry of the flat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidAssoc {
    pub config: PidConfigId,
}

/// Configuration of one container.
#[derive(Debug, Clone)]
pub struct Container {
    pub contid: ContainerID,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Defaults for entries created for processes without configuration.
    pub attr: SchedAttr,
    pids: Vec<PidAssoc>,
    removed: bool,
}

impl Container {
    pub fn new(contid: ContainerID) -> Self {
        Self {
            contid,
            name: None,
            image: None,
            attr: SchedAttr::default(),
            pids: Vec::new(),
            removed: false,
        }
    }

    /// Associated configuration entries, most recently added first.
    pub fn pids(&self) -> impl Iterator<Item = PidConfigId> + '_ {
        self.pids.iter().rev().map(|assoc| assoc.config)
    }

    /// `true` once a removal event detached the container.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Clears the removal mark.
    pub fn revive(&mut self) {
        self.removed = false;
    }
}

/// Owner of all [`PidConfig`] and [`Container`] records.
#[derive(Debug, Default)]
pub struct ConfigStore {
    configs: Vec<PidConfig>,
    containers: Vec<Container>,
    placeholders: usize,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the flat list only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the list cannot grow.
    pub fn push_config(&mut self, config: PidConfig) -> Result<PidConfigId> {
        self.configs.try_reserve(1)?;
        if config.placeholder {
            self.placeholders += 1;
        }
        self.configs.push(config);
        Ok(PidConfigId(self.configs.len() - 1))
    }

    /// Adds an entry to the flat list and to the association list of the
    /// container with the exact id `contid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownContainer`] if no such container exists and
    /// [`Error::Allocation`] if either list cannot grow. On error neither list
    /// is modified.
    pub fn pcpush(&mut self, contid: &str, config: PidConfig) -> Result<PidConfigId> {
        let pos = self
            .containers
            .iter()
            .position(|cont| cont.contid.as_ref() == contid)
            .ok_or_else(|| Error::UnknownContainer(contid.to_owned()))?;
        self.pcpush_at(pos, config)
    }

    pub(super) fn pcpush_at(&mut self, pos: usize, mut config: PidConfig) -> Result<PidConfigId> {
        let Some(container) = self.containers.get_mut(pos) else {
            return Err(Error::NotFound);
        };
        container.pids.try_reserve(1)?;
        self.configs.try_reserve(1)?;

        config.container = Some(container.contid.clone());
        let id = PidConfigId(self.configs.len());
        container.pids.push(PidAssoc { config: id });
        if config.placeholder {
            self.placeholders += 1;
        }
        self.configs.push(config);
        Ok(id)
    }

    /// Adds an empty container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the list cannot grow.
    pub fn cpush(&mut self, contid: ContainerID) -> Result<&mut Container> {
        self.containers.try_reserve(1)?;
        self.containers.push(Container::new(contid));
        let pos = self.containers.len() - 1;
        Ok(&mut self.containers[pos])
    }

    pub fn config(&self, id: PidConfigId) -> Option<&PidConfig> {
        self.configs.get(id.0)
    }

    pub fn config_mut(&mut self, id: PidConfigId) -> Option<&mut PidConfig> {
        self.configs.get_mut(id.0)
    }

    /// Flat configuration list, most recently added first.
    pub fn configs(&self) -> impl Iterator<Item = (PidConfigId, &PidConfig)> {
        self.configs
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, config)| (PidConfigId(idx), config))
    }

    /// Containers, most recently added first.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.iter().rev()
    }

    /// Looks a container up by its exact id.
    pub fn container(&self, contid: &str) -> Option<&Container> {
        self.containers().find(|cont| cont.contid.as_ref() == contid)
    }

    pub fn container_mut(&mut self, contid: &str) -> Option<&mut Container> {
        self.containers
            .iter_mut()
            .rev()
            .find(|cont| cont.contid.as_ref() == contid)
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Number of entries created for processes without configuration.
    pub fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    /// Position of the newest active container matching `contid` on the short
    /// id.
    pub(super) fn find_container_short(&self, contid: &str) -> Option<usize> {
        self.position_short(contid, false)
    }

    pub(super) fn position_short(&self, contid: &str, include_removed: bool) -> Option<usize> {
        self.containers
            .iter()
            .rposition(|cont| (include_removed || !cont.removed) && cont.contid.matches(contid))
    }

    pub(super) fn container_at(&self, pos: usize) -> Option<&Container> {
        self.containers.get(pos)
    }

    pub(super) fn container_at_mut(&mut self, pos: usize) -> Option<&mut Container> {
        self.containers.get_mut(pos)
    }

    /// Newest configured entry of the flat list with signature `psig`.
    /// Placeholders are only visible through their container.
    pub fn find_config(&self, psig: &str) -> Option<PidConfigId> {
        self.configs()
            .find(|(_, config)| !config.placeholder && config.psig.as_deref() == Some(psig))
            .map(|(id, _)| id)
    }

    /// Detaches the association list of the container matching `contid` and
    /// marks it removed. Returns the number of detached associations, or
    /// `None` if no active container matches.
    pub fn mark_removed(&mut self, contid: &str) -> Option<usize> {
        let pos = self.find_container_short(contid)?;
        let container = &mut self.containers[pos];
        let detached = std::mem::take(&mut container.pids);
        container.removed = true;
        let owner = container.contid.clone();

        for assoc in &detached {
            if let Some(config) = self.configs.get_mut(assoc.config.0) {
                if config.container.as_ref() == Some(&owner) {
                    config.container = None;
                }
            }
        }
        Some(detached.len())
    }

    /// Evicts removed containers that no node refers to any more. Returns the
    /// number of evicted containers.
    pub fn collect_removed(&mut self, nodes: &NodeStore) -> usize {
        let before = self.containers.len();
        self.containers.retain(|cont| {
            !cont.removed
                || nodes
                    .iter()
                    .filter_map(|node| node.contid.as_deref())
                    .any(|contid| cont.contid.matches(contid))
        });
        let evicted = before - self.containers.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} removed containers");
        }
        evicted
    }

    /// Verifies the association lists against the flat list.
    ///
    /// Associations pointing outside the flat list are dropped; entries that
    /// lost their back-link are relinked. Returns `(fixed, corrupted)`.
    pub fn check_consistency(&mut self) -> (usize, usize) {
        let mut fixed = 0;
        let mut corrupted = 0;

        for container in self.containers.iter_mut().filter(|cont| !cont.removed) {
            let configs = &mut self.configs;
            container.pids.retain(|assoc| match configs.get_mut(assoc.config.0) {
                None => {
                    log::warn!(
                        "container {} references unknown configuration #{}",
                        container.contid.short(),
                        assoc.config.0
                    );
                    corrupted += 1;
                    false
                }
                Some(config) => {
                    match &config.container {
                        None => {
                            config.container = Some(container.contid.clone());
                            fixed += 1;
                        }
                        Some(owner) if *owner != container.contid => {
                            log::warn!(
                                "configuration #{} listed under {} but linked to {}",
                                assoc.config.0,
                                container.contid.short(),
                                owner.short()
                            );
                            corrupted += 1;
                        }
                        Some(_) => {}
                    }
                    true
                }
            });
        }

        if fixed > 0 || corrupted > 0 {
            log::info!("configuration check: {fixed} fixed, {corrupted} corrupted");
        }
        (fixed, corrupted)
    }
}
