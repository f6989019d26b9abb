//! Scheduling descriptor shared by runtime nodes and persisted configuration.
//!
//! [`SchedAttr`] mirrors the fields of the Linux `struct sched_attr`. Nothing in
//! this crate applies it to a process; it is read from the kernel and compared
//! against the desired configuration.

use super::{Error, Result};

/// Size in bytes of the kernel `struct sched_attr` (version 0).
pub const SCHED_ATTR_SIZE: u32 = 48;
/// Marker policy: no scheduling data available.
pub const SCHED_NODATA: u32 = 0xFFFF;

pub const SCHED_OTHER: u32 = 0;
pub const SCHED_FIFO: u32 = 1;
pub const SCHED_RR: u32 = 2;
pub const SCHED_BATCH: u32 = 3;
pub const SCHED_IDLE: u32 = 5;
pub const SCHED_DEADLINE: u32 = 6;

/// Scheduling attributes of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedAttr {
    pub size: u32,
    pub policy: u32,
    pub flags: u64,
    pub nice: i32,
    pub priority: u32,
    /// Deadline runtime budget in nanoseconds.
    pub runtime: u64,
    /// Relative deadline in nanoseconds.
    pub deadline: u64,
    /// Period in nanoseconds.
    pub period: u64,
}

impl Default for SchedAttr {
    fn default() -> Self {
        Self {
            size: SCHED_ATTR_SIZE,
            policy: SCHED_NODATA,
            flags: 0,
            nice: 0,
            priority: 0,
            runtime: 0,
            deadline: 0,
            period: 0,
        }
    }
}

impl SchedAttr {
    /// Returns `true` if no policy has been read or configured.
    pub fn has_data(&self) -> bool {
        self.policy != SCHED_NODATA
    }
}

/// Returns `true` for the fixed-priority and deadline policies.
pub fn policy_is_realtime(policy: u32) -> bool {
    matches!(policy, SCHED_FIFO | SCHED_RR | SCHED_DEADLINE)
}

/// Human readable name of a policy number.
pub fn policy_to_string(policy: u32) -> &'static str {
    match policy {
        SCHED_OTHER => "SCHED_OTHER",
        SCHED_FIFO => "SCHED_FIFO",
        SCHED_RR => "SCHED_RR",
        SCHED_BATCH => "SCHED_BATCH",
        SCHED_IDLE => "SCHED_IDLE",
        SCHED_DEADLINE => "SCHED_DEADLINE",
        SCHED_NODATA => "SCHED_NODATA",
        _ => "unknown",
    }
}

/// Parses a policy name.
///
/// Accepts the kernel constant names (`SCHED_FIFO`) as well as the short forms
/// (`fifo`), case-insensitively. `default` maps to [`SCHED_NODATA`].
///
/// # Errors
///
/// Returns [`Error::UnknownPolicy`] for any other input.
pub fn string_to_policy(name: &str) -> Result<u32> {
    let lower = name.trim().to_ascii_lowercase();
    let short = lower.strip_prefix("sched_").unwrap_or(&lower);
    let policy = match short {
        "other" | "normal" => SCHED_OTHER,
        "fifo" => SCHED_FIFO,
        "rr" => SCHED_RR,
        "batch" => SCHED_BATCH,
        "idle" => SCHED_IDLE,
        "deadline" => SCHED_DEADLINE,
        "default" | "nodata" => SCHED_NODATA,
        _ => return Err(Error::UnknownPolicy(name.to_owned())),
    };
    Ok(policy)
}
