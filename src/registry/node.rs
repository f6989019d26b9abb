//! Runtime process records kept as a singly linked list inside a slot arena.
//!
//! The list order is controlled entirely by the callers: [`NodeStore::push`]
//! prepends, [`NodeStore::insert_after`] splices behind a [`Cursor`]. The
//! reconciler uses these primitives to keep the list ascending by pid.

use std::time::Duration;

use crate::Pid;
use crate::sched::{SchedAttr, SchedStats};

use super::{Error, Label, PidConfigId, Result};

/// Tracking record of one observed process.
#[derive(Debug)]
pub struct Node {
    pub pid: Pid,
    pub psig: Option<Label>,
    pub contid: Option<Label>,
    /// Scheduling attributes read from the kernel when the pid was first seen.
    pub attr: SchedAttr,
    /// Round-robin time slice, zero unless the task runs `SCHED_RR`.
    pub rr_interval: Duration,
    pub stats: SchedStats,
    /// Configuration entry this node is bound to, if any.
    pub param: Option<PidConfigId>,
    serial: u64,
}

impl Node {
    fn new(serial: u64, pid: Pid, psig: Option<Label>, contid: Option<Label>) -> Self {
        Self {
            pid,
            psig,
            contid,
            attr: SchedAttr::default(),
            rr_interval: Duration::ZERO,
            stats: SchedStats::default(),
            param: None,
            serial,
        }
    }

    /// Identity of the record. Never reused within one store, so two reads
    /// with the same serial observed the same record.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Position in a [`NodeStore`] list: either before the head or at a node.
///
/// A cursor remembers the serial of its node, so once that node is removed
/// the cursor goes stale even if its slot is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(Option<Position>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    idx: usize,
    serial: u64,
}

impl Cursor {
    /// The position before the first node.
    pub const HEAD: Cursor = Cursor(None);

    pub fn is_head(&self) -> bool {
        self.0.is_none()
    }
}

#[derive(Debug)]
struct Slot {
    node: Node,
    next: Option<usize>,
}

/// Owner of all runtime [`Node`]s.
#[derive(Debug, Default)]
pub struct NodeStore {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    len: usize,
    next_serial: u64,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Prepends a new defaulted node.
    ///
    /// # Errors
    ///
    /// Returns [`super::Error::Allocation`] if the arena cannot grow.
    pub fn push(&mut self, pid: Pid, psig: Option<Label>, contid: Option<Label>) -> Result<&mut Node> {
        let idx = self.push_slot(pid, psig, contid)?;
        Ok(&mut self.slot_mut(idx).node)
    }

    /// Inserts a new node behind `prev` and moves `prev` onto it.
    ///
    /// A cursor at [`Cursor::HEAD`] inserts at the front of the list. Inserting
    /// repeatedly through the same cursor therefore keeps the insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleCursor`] if the node under `prev` was removed and
    /// [`Error::Allocation`] if the arena cannot grow.
    pub fn insert_after(
        &mut self,
        prev: &mut Cursor,
        pid: Pid,
        psig: Option<Label>,
        contid: Option<Label>,
    ) -> Result<&mut Node> {
        let idx = match prev.0 {
            None => self.push_slot(pid, psig, contid)?,
            Some(at) => {
                let next = self.live(at).ok_or(Error::StaleCursor)?.next;
                let node = self.make_node(pid, psig, contid);
                let idx = self.alloc(node, next)?;
                self.slot_mut(at.idx).next = Some(idx);
                idx
            }
        };
        *prev = self.cursor_at(idx);
        Ok(&mut self.slot_mut(idx).node)
    }

    /// Removes the first node and returns its pid.
    pub fn pop(&mut self) -> Option<Pid> {
        let idx = self.head?;
        let slot = self.release(idx)?;
        self.head = slot.next;
        Some(slot.node.pid)
    }

    /// Removes the node following `prev` and returns its pid.
    ///
    /// At [`Cursor::HEAD`] this is [`NodeStore::pop`]. Returns `None` if
    /// nothing follows `prev` or `prev` is stale.
    pub fn drop_after(&mut self, prev: Cursor) -> Option<Pid> {
        let Some(at) = prev.0 else {
            return self.pop();
        };
        let victim = self.live(at)?.next?;
        let slot = self.release(victim)?;
        self.slot_mut(at.idx).next = slot.next;
        Some(slot.node.pid)
    }

    /// Returns the node following `cursor`, `None` at the end or for a stale
    /// cursor.
    pub fn after(&self, cursor: Cursor) -> Option<&Node> {
        self.next_index(cursor).map(|idx| &self.slot(idx).node)
    }

    pub fn after_mut(&mut self, cursor: Cursor) -> Option<&mut Node> {
        let idx = self.next_index(cursor)?;
        Some(&mut self.slot_mut(idx).node)
    }

    /// Moves `cursor` onto the node following it, if there is one.
    pub fn advance(&self, cursor: Cursor) -> Option<Cursor> {
        self.next_index(cursor).map(|idx| self.cursor_at(idx))
    }

    /// Iterates over the nodes in list order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            store: self,
            next: self.head,
        }
    }

    /// Iterates mutably over the nodes in storage order, which is unrelated to
    /// list order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.slots.iter_mut().flatten().map(|slot| &mut slot.node)
    }

    pub fn get(&self, pid: Pid) -> Option<&Node> {
        self.iter().find(|node| node.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Node> {
        self.nodes_mut().find(|node| node.pid == pid)
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.iter().map(|node| node.pid).collect()
    }

    /// Returns `true` if pids are strictly ascending along the list.
    pub fn is_sorted(&self) -> bool {
        let mut iter = self.iter().map(|node| node.pid);
        let Some(mut last) = iter.next() else {
            return true;
        };
        for pid in iter {
            if pid <= last {
                return false;
            }
            last = pid;
        }
        true
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    fn push_slot(&mut self, pid: Pid, psig: Option<Label>, contid: Option<Label>) -> Result<usize> {
        let node = self.make_node(pid, psig, contid);
        let idx = self.alloc(node, self.head)?;
        self.head = Some(idx);
        Ok(idx)
    }

    fn make_node(&mut self, pid: Pid, psig: Option<Label>, contid: Option<Label>) -> Node {
        let serial = self.next_serial;
        self.next_serial += 1;
        Node::new(serial, pid, psig, contid)
    }

    fn alloc(&mut self, node: Node, next: Option<usize>) -> Result<usize> {
        let slot = Slot { node, next };
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            self.len += 1;
            return Ok(idx);
        }

        self.slots.try_reserve(1)?;
        // keep room for every slot in the free list so releasing never allocates
        self.free
            .try_reserve(self.slots.len() + 1 - self.free.len())?;
        self.slots.push(Some(slot));
        self.len += 1;
        Ok(self.slots.len() - 1)
    }

    fn release(&mut self, idx: usize) -> Option<Slot> {
        let slot = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.len -= 1;
        Some(slot)
    }

    fn next_index(&self, cursor: Cursor) -> Option<usize> {
        match cursor.0 {
            None => self.head,
            Some(at) => self.live(at)?.next,
        }
    }

    /// Slot under `at`, unless its node was removed in the meantime.
    fn live(&self, at: Position) -> Option<&Slot> {
        self.slots
            .get(at.idx)?
            .as_ref()
            .filter(|slot| slot.node.serial == at.serial)
    }

    fn cursor_at(&self, idx: usize) -> Cursor {
        Cursor(Some(Position {
            idx,
            serial: self.slot(idx).node.serial,
        }))
    }

    fn slot(&self, idx: usize) -> &Slot {
        match &self.slots[idx] {
            Some(slot) => slot,
            None => unreachable!("link to released slot {idx}"),
        }
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        match &mut self.slots[idx] {
            Some(slot) => slot,
            None => unreachable!("link to released slot {idx}"),
        }
    }
}

/// List-order iterator over a [`NodeStore`].
pub struct Iter<'a> {
    store: &'a NodeStore,
    next: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.store.slot(self.next?);
        self.next = slot.next;
        Some(&slot.node)
    }
}
