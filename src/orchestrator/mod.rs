//! Long running tasks around the registry and their run/stop control.
//!
//! The update task owns the reconciliation loop, the watch task forwards
//! container events to it, the manage task keeps bindings and runtime
//! statistics current. All of them share one [`SharedRegistry`].
//!
//! [`SharedRegistry`]: crate::registry::SharedRegistry

mod control;
mod manage;
mod update;
mod watch;

use std::sync::{MutexGuard, PoisonError};

pub use control::{Control, ControlState};
pub use manage::{ManageReport, ManageTask};
pub use update::UpdateTask;
pub use watch::WatchTask;

use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] crate::registry::Error),
    #[error("registry lock poisoned")]
    Poisoned,
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

impl From<PoisonError<MutexGuard<'_, Registry>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, Registry>>) -> Self {
        Self::Poisoned
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Spawns a named task thread.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the thread cannot be created.
pub fn spawn<T, F>(name: &'static str, task: F) -> Result<std::thread::JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(task)
        .map_err(|source| Error::Spawn { name, source })
}

/// Waits for a task thread and returns its result.
///
/// # Errors
///
/// Returns [`Error::Panicked`] if the thread panicked, otherwise the task's own
/// error.
pub fn join(name: &'static str, handle: std::thread::JoinHandle<Result<()>>) -> Result<()> {
    handle.join().map_err(|_| Error::Panicked(name))?
}
