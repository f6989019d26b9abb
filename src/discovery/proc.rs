use std::path::PathBuf;

use crate::Pid;
use crate::container::is_hex_id;
use crate::fsutil;
use crate::registry::ObservedPid;

use super::{Error, PidEnumerator, Result};

/// Runtime prefixes put in front of container ids in cgroup path segments.
const SCOPE_PREFIXES: [&str; 4] = ["docker-", "cri-containerd-", "crio-", "libpod-"];

/// [`PidEnumerator`] scanning the numeric entries of a proc file system.
///
/// Only processes are listed. Threads below `/proc/<pid>/task` are not
/// enumerated.
#[derive(Debug, Clone)]
pub struct ProcScanner {
    proc_root: PathBuf,
}

impl ProcScanner {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Reads the signature and container id of `pid` if its name is `tag`.
    ///
    /// The name is either `comm`, which the kernel truncates to 15 bytes, or
    /// the file name of the first `cmdline` argument. Returns `None` for other
    /// processes and for processes that exited while being read.
    fn inspect(&self, pid: Pid, tag: &str) -> Option<ObservedPid> {
        let dir = self.proc_root.join(pid.to_string());
        let comm = fsutil::read_file(dir.join("comm")).ok();
        let comm = comm.as_deref().map(|comm| comm.trim_end_matches('\n'));
        let cmdline = fsutil::read_file(dir.join("cmdline")).unwrap_or_default();
        if comm != Some(tag) && program_name(&cmdline) != Some(tag) {
            return None;
        }

        let psig = Some(cmdline_to_signature(&cmdline))
            .filter(|psig| !psig.is_empty())
            .or_else(|| comm.map(str::to_owned))?;
        let contid = fsutil::read_file(dir.join("cgroup"))
            .ok()
            .and_then(|content| container_id_from_cgroup(&content));

        Some(ObservedPid {
            pid,
            psig: Some(psig),
            contid,
        })
    }
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl PidEnumerator for ProcScanner {
    fn enumerate_pids(&self, tag: &str, max: usize) -> Result<Vec<ObservedPid>> {
        let entries = std::fs::read_dir(&self.proc_root).map_err(|source| Error::ProcRead {
            path: self.proc_root.clone(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in entries.flatten() {
            if found.len() >= max {
                log::debug!("pid limit of {max} reached for `{tag}`");
                break;
            }
            let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse::<Pid>().ok()) else {
                continue;
            };
            if let Some(observed) = self.inspect(pid, tag) {
                found.push(observed);
            }
        }

        log::trace!("found {} `{tag}` processes", found.len());
        Ok(found)
    }
}

/// File name of the first argument of a `cmdline` file.
fn program_name(cmdline: &str) -> Option<&str> {
    let argv0 = cmdline.split('\0').next().filter(|arg| !arg.is_empty())?;
    argv0.rsplit('/').next()
}

/// Joins the NUL separated arguments of a `cmdline` file with spaces.
fn cmdline_to_signature(cmdline: &str) -> String {
    cmdline
        .split('\0')
        .filter(|arg| !arg.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts a full container id from the content of `/proc/<pid>/cgroup`.
///
/// Both cgroup v1 (`4:cpu:/docker/<id>`) and v2
/// (`0::/system.slice/docker-<id>.scope`) layouts are recognised.
pub fn container_id_from_cgroup(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.splitn(3, ':').nth(2))
        .flat_map(|path| path.rsplit('/'))
        .map(strip_scope)
        .find(|segment| is_hex_id(segment))
        .map(str::to_owned)
}

fn strip_scope(segment: &str) -> &str {
    let segment = segment.strip_suffix(".scope").unwrap_or(segment);
    SCOPE_PREFIXES
        .iter()
        .find_map(|prefix| segment.strip_prefix(prefix))
        .unwrap_or(segment)
}
