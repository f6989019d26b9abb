//! Scheduling attributes, per-process runtime statistics and the read-only
//! kernel query collaborator used to populate them.
mod attr;
mod error;
mod query;
mod stats;

pub use attr::{
    SCHED_ATTR_SIZE, SCHED_BATCH, SCHED_DEADLINE, SCHED_FIFO, SCHED_IDLE, SCHED_NODATA,
    SCHED_OTHER, SCHED_RR, SchedAttr, policy_is_realtime, policy_to_string, string_to_policy,
};
pub use error::{Error, Result};
pub use query::{ProcSchedQuery, SchedQuery};
pub use stats::SchedStats;
