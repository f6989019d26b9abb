use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Pid;
use crate::fsutil;

use super::attr::{SCHED_RR, SchedAttr};
use super::{Error, Result};

/// Read-only scheduling queries against the kernel.
pub trait SchedQuery: Send + Sync {
    /// Reads the current scheduling attributes of `pid`.
    fn get_sched_attr(&self, pid: Pid) -> Result<SchedAttr>;

    /// Reads the round-robin time slice of `pid`. Zero for non-RR tasks.
    fn get_rr_interval(&self, pid: Pid) -> Result<Duration>;

    /// Reads the cumulative on-cpu time of `pid` in nanoseconds.
    fn get_runtime(&self, pid: Pid) -> Result<u64>;
}

/// [`SchedQuery`] backed by the proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcSchedQuery {
    proc_root: PathBuf,
}

impl ProcSchedQuery {
    /// Creates a query rooted at `proc_root` (usually `/proc`).
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn pid_file(&self, pid: Pid, name: &str) -> PathBuf {
        self.proc_root.join(pid.to_string()).join(name)
    }
}

impl Default for ProcSchedQuery {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl SchedQuery for ProcSchedQuery {
    fn get_sched_attr(&self, pid: Pid) -> Result<SchedAttr> {
        let path = self.pid_file(pid, "stat");
        let content = fsutil::read_file(&path)?;
        parse_stat_line(&content, &path)
    }

    fn get_rr_interval(&self, pid: Pid) -> Result<Duration> {
        let attr = self.get_sched_attr(pid)?;
        if attr.policy != SCHED_RR {
            return Ok(Duration::ZERO);
        }
        let path = self.proc_root.join("sys/kernel/sched_rr_timeslice_ms");
        let content = fsutil::read_file(&path)?;
        let ms = content.trim().parse::<u64>().map_err(|_| Error::Parse {
            path,
            reason: format!("invalid time slice `{}`", content.trim()),
        })?;
        Ok(Duration::from_millis(ms))
    }

    fn get_runtime(&self, pid: Pid) -> Result<u64> {
        let path = self.pid_file(pid, "schedstat");
        let content = fsutil::read_file(&path)?;
        let first = content.split_whitespace().next().unwrap_or_default();
        first.parse::<u64>().map_err(|_| Error::Parse {
            path,
            reason: format!("invalid runtime `{first}`"),
        })
    }
}

/// Index of `nice` (field 19) after the command name.
const FIELD_NICE: usize = 16;
/// Index of `rt_priority` (field 40) after the command name.
const FIELD_RT_PRIORITY: usize = 37;
/// Index of `policy` (field 41) after the command name.
const FIELD_POLICY: usize = 38;

/// Parses the scheduling related fields of a `/proc/<pid>/stat` line.
///
/// The command name is enclosed in parentheses and may itself contain spaces
/// or parentheses, so fields are counted from the last `)`.
fn parse_stat_line(line: &str, origin: &Path) -> Result<SchedAttr> {
    let rest = line
        .rfind(')')
        .map(|idx| &line[idx + 1..])
        .ok_or_else(|| Error::Parse {
            path: origin.to_path_buf(),
            reason: "missing command name".to_owned(),
        })?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let parse_err = |name: &str, value: &str| Error::Parse {
        path: origin.to_path_buf(),
        reason: format!("invalid {name} `{value}`"),
    };

    let nice = stat_field(&fields, FIELD_NICE, "nice", origin)?;
    let prio = stat_field(&fields, FIELD_RT_PRIORITY, "rt_priority", origin)?;
    let policy = stat_field(&fields, FIELD_POLICY, "policy", origin)?;

    Ok(SchedAttr {
        nice: nice.parse().map_err(|_| parse_err("nice", nice))?,
        priority: prio.parse().map_err(|_| parse_err("rt_priority", prio))?,
        policy: policy.parse().map_err(|_| parse_err("policy", policy))?,
        ..SchedAttr::default()
    })
}

fn stat_field<'a>(fields: &[&'a str], idx: usize, name: &str, origin: &Path) -> Result<&'a str> {
    fields.get(idx).copied().ok_or_else(|| Error::Parse {
        path: origin.to_path_buf(),
        reason: format!("missing field `{name}`"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::attr::{SCHED_FIFO, SCHED_OTHER};

    fn stat_line(comm: &str, nice: i32, prio: u32, policy: u32) -> String {
        // pid (comm) state, then fields 4..=52
        let mut fields: Vec<String> = (4..=52).map(|n| n.to_string()).collect();
        fields[19 - 4] = nice.to_string();
        fields[40 - 4] = prio.to_string();
        fields[41 - 4] = policy.to_string();
        format!("1234 ({comm}) S {}\n", fields.join(" "))
    }

    fn fake_proc(pid: Pid, stat: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join(pid.to_string());
        std::fs::create_dir_all(&pid_dir).unwrap();
        std::fs::write(pid_dir.join("stat"), stat).unwrap();
        std::fs::write(pid_dir.join("schedstat"), "123456 789 10\n").unwrap();
        std::fs::create_dir_all(dir.path().join("sys/kernel")).unwrap();
        std::fs::write(dir.path().join("sys/kernel/sched_rr_timeslice_ms"), "100\n").unwrap();
        dir
    }

    #[test]
    fn test_parse_stat_line_fifo() {
        let line = stat_line("worker", 0, 80, SCHED_FIFO);
        let attr = parse_stat_line(&line, Path::new("/dummy")).unwrap();
        assert_eq!(attr.policy, SCHED_FIFO);
        assert_eq!(attr.priority, 80);
        assert_eq!(attr.nice, 0);
    }

    #[test]
    fn test_parse_stat_line_comm_with_parens() {
        let line = stat_line("we (ird) name", -5, 0, SCHED_OTHER);
        let attr = parse_stat_line(&line, Path::new("/dummy")).unwrap();
        assert_eq!(attr.policy, SCHED_OTHER);
        assert_eq!(attr.nice, -5);
    }

    #[test]
    fn test_parse_stat_line_truncated() {
        let err = parse_stat_line("1 (x) S 1 2 3", Path::new("/dummy")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_proc_query_reads_files() {
        let dir = fake_proc(42, &stat_line("rt", 0, 10, SCHED_RR));
        let query = ProcSchedQuery::new(dir.path());
        assert_eq!(query.get_sched_attr(42).unwrap().policy, SCHED_RR);
        assert_eq!(query.get_rr_interval(42).unwrap(), Duration::from_millis(100));
        assert_eq!(query.get_runtime(42).unwrap(), 123_456);
    }

    #[test]
    fn test_proc_query_rr_interval_zero_for_fifo() {
        let dir = fake_proc(7, &stat_line("rt", 0, 10, SCHED_FIFO));
        let query = ProcSchedQuery::new(dir.path());
        assert_eq!(query.get_rr_interval(7).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_proc_query_missing_pid() {
        let dir = tempfile::tempdir().unwrap();
        let query = ProcSchedQuery::new(dir.path());
        assert!(matches!(query.get_sched_attr(1), Err(Error::Read(_))));
    }
}
