//! Collaborators that observe the system: pid enumeration through `/proc` and
//! container lifecycle events from the Docker CLI.

pub mod docker;
mod proc;

use std::io;
use std::path::PathBuf;

pub use docker::{DockerEvents, EventSource, LineEventSource, Terminator, decode_event};
pub use proc::{ProcScanner, container_id_from_cgroup};

use crate::registry::ObservedPid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read proc directory `{path}`: {source}")]
    ProcRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed container event `{line}`: {source}")]
    MalformedEvent {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("container event `{action}` without container id")]
    MissingContainerId { action: String },
    #[error("failed to spawn event command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("event command `{0}` has no stdout")]
    NoStdout(String),
    #[error("failed to read event stream: {0}")]
    EventRead(#[source] io::Error),
}

impl Error {
    /// `true` for errors that only affect a single event.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedEvent { .. } | Self::MissingContainerId { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Source of the processes to track.
pub trait PidEnumerator: Send {
    /// Returns up to `max` processes whose name equals `tag`, in no particular
    /// order.
    ///
    /// An empty vector means that no such process runs. Errors mean that the
    /// process table could not be read at all.
    fn enumerate_pids(&self, tag: &str, max: usize) -> Result<Vec<ObservedPid>>;
}
