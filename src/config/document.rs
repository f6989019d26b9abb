use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::container::ContainerID;
use crate::fsutil;
use crate::registry::{ConfigStore, PidConfig};
use crate::sched::{self, SchedAttr, string_to_policy};

use super::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    containers: Vec<ContainerEntry>,
    pids: Vec<PidEntry>,
}

#[derive(Debug, Deserialize)]
struct ContainerEntry {
    contid: String,
    #[serde(default)]
    params: Option<Params>,
    #[serde(default)]
    pids: Vec<PidEntry>,
}

#[derive(Debug, Deserialize)]
struct PidEntry {
    cmd: String,
    #[serde(default)]
    params: Option<Params>,
}

/// Scheduling parameters as written in the file. Times are in nanoseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Params {
    policy: Option<String>,
    flags: u64,
    nice: i32,
    prio: u32,
    runtime: u64,
    deadline: Option<u64>,
    period: Option<u64>,
}

impl Params {
    fn to_attr(&self) -> sched::Result<SchedAttr> {
        let policy = match &self.policy {
            Some(name) => string_to_policy(name)?,
            None => sched::SCHED_NODATA,
        };
        let deadline = self.deadline.unwrap_or(self.runtime);
        Ok(SchedAttr {
            policy,
            flags: self.flags,
            nice: self.nice,
            priority: self.prio,
            runtime: self.runtime,
            deadline,
            period: self.period.unwrap_or(deadline),
            ..SchedAttr::default()
        })
    }
}

fn attr_of(params: Option<&Params>, entry: &str) -> Result<SchedAttr> {
    params
        .map(Params::to_attr)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|source| Error::Params {
            entry: entry.to_owned(),
            source,
        })
}

/// Builds a [`ConfigStore`] from a JSON configuration document.
///
/// Processes listed under a container are linked to it; top level processes
/// only enter the flat list.
///
/// # Errors
///
/// Returns [`Error::Document`] for invalid JSON, [`Error::Params`] for unknown
/// policies and [`Error::Container`] for invalid container ids.
pub fn from_reader(reader: impl Read) -> Result<ConfigStore> {
    let document: Document = serde_json::from_reader(reader).map_err(Error::Document)?;
    build(document)
}

/// Loads the configuration file at `path`.
///
/// # Errors
///
/// Like [`from_reader`], plus [`Error::Open`] if the file cannot be opened.
/// JSON errors are reported as [`Error::Parse`] with the path.
pub fn load_file(path: impl AsRef<Path>) -> Result<ConfigStore> {
    let path = path.as_ref();
    let reader = fsutil::open_file_reader(path)?;
    let document: Document = serde_json::from_reader(reader).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let store = build(document)?;
    log::info!(
        "loaded {} containers and {} process configurations from `{}`",
        store.container_count(),
        store.config_count(),
        path.display()
    );
    Ok(store)
}

fn build(document: Document) -> Result<ConfigStore> {
    let mut store = ConfigStore::new();

    for entry in document.containers {
        let contid = ContainerID::new(&entry.contid)?;
        let attr = attr_of(entry.params.as_ref(), &entry.contid)?;
        store.cpush(contid)?.attr = attr;

        for pid in entry.pids {
            let attr = attr_of(pid.params.as_ref(), &pid.cmd)?;
            store.pcpush(&entry.contid, PidConfig::new(pid.cmd, attr))?;
        }
    }

    for pid in document.pids {
        let attr = attr_of(pid.params.as_ref(), &pid.cmd)?;
        store.push_config(PidConfig::new(pid.cmd, attr))?;
    }

    let (fixed, corrupted) = store.check_consistency();
    if corrupted > 0 {
        log::warn!("configuration has {corrupted} inconsistent entries ({fixed} fixed)");
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{SCHED_DEADLINE, SCHED_FIFO, SCHED_NODATA};

    const DOCUMENT: &str = r#"{
        "containers": [
            {
                "contid": "d7408531a3b4",
                "params": { "policy": "SCHED_FIFO", "prio": 20 },
                "pids": [
                    { "cmd": "ffmpeg -i input", "params": { "policy": "deadline", "runtime": 1000000, "period": 10000000 } },
                    { "cmd": "sleep 5" }
                ]
            }
        ],
        "pids": [
            { "cmd": "bash", "params": { "policy": "fifo", "prio": 5, "nice": -2 } }
        ],
        "global": { "ignored": true }
    }"#;

    #[test]
    fn test_from_reader() {
        let store = from_reader(DOCUMENT.as_bytes()).unwrap();
        assert_eq!(store.container_count(), 1);
        assert_eq!(store.config_count(), 3);

        let container = store.container("d7408531a3b4").unwrap();
        assert_eq!(container.attr.policy, SCHED_FIFO);
        assert_eq!(container.attr.priority, 20);
        assert_eq!(container.pids().count(), 2);

        let ffmpeg = store.config(store.find_config("ffmpeg -i input").unwrap()).unwrap();
        assert_eq!(ffmpeg.attr.policy, SCHED_DEADLINE);
        assert_eq!(ffmpeg.attr.runtime, 1_000_000);
        assert_eq!(ffmpeg.attr.deadline, 1_000_000);
        assert_eq!(ffmpeg.attr.period, 10_000_000);
        assert!(ffmpeg.container.is_some());

        let sleep = store.config(store.find_config("sleep 5").unwrap()).unwrap();
        assert_eq!(sleep.attr.policy, SCHED_NODATA);

        let bash = store.config(store.find_config("bash").unwrap()).unwrap();
        assert_eq!(bash.attr.nice, -2);
        assert!(bash.container.is_none());
    }

    #[test]
    fn test_empty_document() {
        let store = from_reader("{}".as_bytes()).unwrap();
        assert_eq!(store.config_count(), 0);
        assert_eq!(store.container_count(), 0);
    }

    #[test]
    fn test_invalid_policy() {
        let doc = r#"{ "pids": [ { "cmd": "x", "params": { "policy": "SCHED_TURBO" } } ] }"#;
        let err = from_reader(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Params { ref entry, .. } if entry == "x"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            from_reader("[1, 2".as_bytes()),
            Err(Error::Document(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, DOCUMENT).unwrap();
        assert_eq!(load_file(&path).unwrap().config_count(), 3);

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(load_file(&path), Err(Error::Parse { .. })));
        assert!(matches!(
            load_file(dir.path().join("missing.json")),
            Err(Error::Open(_))
        ));
    }
}
