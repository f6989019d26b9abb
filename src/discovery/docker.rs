//! Container lifecycle events read from `docker events --format '{{json .}}'`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::registry::{ContainerEvent, EventKind};

use super::{Error, Result};

/// One JSON line as printed by the Docker CLI. Older engines fill `status`,
/// `id` and `from`, newer ones `Action` and `Actor`.
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Action", default)]
    action: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(rename = "Actor", default)]
    actor: RawActor,
    #[serde(rename = "timeNano", default)]
    time_nano: Option<u64>,
    #[serde(default)]
    time: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawActor {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

/// Decodes one event line.
///
/// Returns `Ok(None)` for blank lines and events not about containers.
///
/// # Errors
///
/// Returns [`Error::MalformedEvent`] for invalid JSON and
/// [`Error::MissingContainerId`] for container events without an id.
pub fn decode_event(line: &str) -> Result<Option<ContainerEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: RawEvent = serde_json::from_str(line).map_err(|source| Error::MalformedEvent {
        line: line.to_owned(),
        source,
    })?;
    if raw.kind != "container" {
        return Ok(None);
    }

    let RawEvent {
        status,
        action,
        id,
        from,
        mut actor,
        time_nano,
        time,
        ..
    } = raw;
    let action = status.or(action).unwrap_or_default();
    // exec events carry the command after a colon
    let verb = action.split(':').next().unwrap_or_default().trim();
    let kind = match verb {
        "create" | "start" => EventKind::Add,
        "kill" | "die" | "destroy" => EventKind::Remove,
        _ => EventKind::Pending,
    };

    let Some(id) = id.or(actor.id).filter(|id| !id.is_empty()) else {
        return Err(Error::MissingContainerId { action });
    };
    let name = actor.attributes.remove("name").unwrap_or_default();
    let image = from
        .or_else(|| actor.attributes.remove("image"))
        .unwrap_or_default();
    let timestamp_ns = time_nano
        .or_else(|| time.map(|secs| secs.saturating_mul(1_000_000_000)))
        .unwrap_or_default();

    Ok(Some(ContainerEvent {
        kind,
        name,
        id,
        image,
        timestamp_ns,
    }))
}

/// Blocking source of decoded container events.
pub trait EventSource: Send {
    /// Waits for the next container event.
    ///
    /// Returns `Ok(None)` at the end of the stream. A malformed line yields an
    /// error for that line only; the source stays usable.
    fn next_event(&mut self) -> Result<Option<ContainerEvent>>;
}

/// [`EventSource`] decoding JSON lines from any reader.
#[derive(Debug)]
pub struct LineEventSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> LineEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> EventSource for LineEventSource<R> {
    fn next_event(&mut self) -> Result<Option<ContainerEvent>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(Error::EventRead)?;
            if read == 0 {
                return Ok(None);
            }
            if let Some(event) = decode_event(&self.line)? {
                return Ok(Some(event));
            }
        }
    }
}

/// Handle that ends a [`DockerEvents`] stream from another thread.
///
/// Killing the child closes its stdout, so a reader blocked in
/// [`EventSource::next_event`] sees the end of the stream.
#[derive(Debug, Clone)]
pub struct Terminator {
    child: Arc<Mutex<Child>>,
}

impl Terminator {
    pub fn terminate(&self) {
        let Ok(mut child) = self.child.lock() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(err) = child.kill() {
            log::debug!("failed to kill event command: {err}");
        }
        let _ = child.wait();
    }
}

/// [`EventSource`] backed by a spawned `docker events` command.
#[derive(Debug)]
pub struct DockerEvents {
    source: LineEventSource<BufReader<ChildStdout>>,
    terminator: Terminator,
}

impl DockerEvents {
    /// Spawns `command` through `sh -c`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the shell cannot be started.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec {command}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.to_owned(),
                source,
            })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(Error::NoStdout(command.to_owned()));
        };
        log::info!("watching container events from `{command}` (pid {})", child.id());

        Ok(Self {
            source: LineEventSource::new(BufReader::new(stdout)),
            terminator: Terminator {
                child: Arc::new(Mutex::new(child)),
            },
        })
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }
}

impl EventSource for DockerEvents {
    fn next_event(&mut self) -> Result<Option<ContainerEvent>> {
        self.source.next_event()
    }
}

impl Drop for DockerEvents {
    fn drop(&mut self) {
        self.terminator.terminate();
    }
}
