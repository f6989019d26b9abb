use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{Error, Result};

const DEFAULT_PID_TAG: &str = "bash";
const DEFAULT_MAX_PIDS: usize = 4096;
const DEFAULT_INTERVAL_US: u64 = 5_000;
const DEFAULT_MANAGE_INTERVAL_US: u64 = 100_000;
const DEFAULT_PROC_PREFIX: &str = "/proc/";
const DEFAULT_DOCKER_EVENTS: &str = "docker events --format '{{json .}}'";

/// Settings of a running orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Process name to track (`ORCH_PID_TAG`).
    pub pid_tag: String,
    /// Upper bound of processes per scan (`ORCH_MAX_PIDS`).
    pub max_pids: usize,
    /// Pause between reconciliation passes (`ORCH_INTERVAL_US`).
    pub interval: Duration,
    /// Pause between manage rounds (`ORCH_MANAGE_INTERVAL_US`).
    pub manage_interval: Duration,
    /// Root of the proc file system, with trailing `/` (`ORCH_PROC_PREFIX`).
    pub proc_prefix: String,
    /// Configuration file to load at start (`ORCH_CONFIG`).
    pub config_path: Option<PathBuf>,
    /// Command printing container events, `None` disables the watcher
    /// (`ORCH_DOCKER_EVENTS`).
    pub docker_events: Option<String>,
    /// Only log kernel parameter writes (`ORCH_DRY_RUN`).
    pub dry_run: bool,
    /// Value written to `sched_rt_runtime_us` at start (`ORCH_RT_RUNTIME_US`).
    pub rt_runtime_us: Option<i64>,
    /// Stop after this long, `None` runs until stopped (`ORCH_RUNTIME_S`).
    pub runtime: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pid_tag: DEFAULT_PID_TAG.to_owned(),
            max_pids: DEFAULT_MAX_PIDS,
            interval: Duration::from_micros(DEFAULT_INTERVAL_US),
            manage_interval: Duration::from_micros(DEFAULT_MANAGE_INTERVAL_US),
            proc_prefix: DEFAULT_PROC_PREFIX.to_owned(),
            config_path: None,
            docker_events: Some(DEFAULT_DOCKER_EVENTS.to_owned()),
            dry_run: false,
            rt_runtime_us: None,
            runtime: None,
        }
    }
}

impl Settings {
    /// Reads the settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for values that do not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Reads the settings through `lookup`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for values that do not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut settings = Self::default();
        let var = |key: &'static str| -> Result<Option<String>> {
            lookup(key)
                .map(|value| {
                    value.into_string().map_err(|value| Error::InvalidValue {
                        key,
                        value: value.to_string_lossy().into_owned(),
                    })
                })
                .transpose()
        };

        if let Some(tag) = var("ORCH_PID_TAG")? {
            if tag.is_empty() {
                return Err(Error::InvalidValue {
                    key: "ORCH_PID_TAG",
                    value: tag,
                });
            }
            settings.pid_tag = tag;
        }
        if let Some(max) = parse_var::<usize>("ORCH_MAX_PIDS", var("ORCH_MAX_PIDS")?)? {
            settings.max_pids = max;
        }
        if let Some(us) = parse_var::<u64>("ORCH_INTERVAL_US", var("ORCH_INTERVAL_US")?)? {
            settings.interval = Duration::from_micros(us);
        }
        if let Some(us) =
            parse_var::<u64>("ORCH_MANAGE_INTERVAL_US", var("ORCH_MANAGE_INTERVAL_US")?)?
        {
            settings.manage_interval = Duration::from_micros(us);
        }
        if let Some(mut prefix) = var("ORCH_PROC_PREFIX")? {
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
            settings.proc_prefix = prefix;
        }
        settings.config_path = var("ORCH_CONFIG")?
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        if let Some(command) = var("ORCH_DOCKER_EVENTS")? {
            settings.docker_events = Some(command).filter(|command| !command.trim().is_empty());
        }
        if let Some(flag) = var("ORCH_DRY_RUN")? {
            settings.dry_run = match flag.as_str() {
                "0" | "false" | "" => false,
                "1" | "true" => true,
                _ => {
                    return Err(Error::InvalidValue {
                        key: "ORCH_DRY_RUN",
                        value: flag,
                    });
                }
            };
        }
        settings.rt_runtime_us =
            parse_var::<i64>("ORCH_RT_RUNTIME_US", var("ORCH_RT_RUNTIME_US")?)?;
        if let Some(secs) = parse_var::<u64>("ORCH_RUNTIME_S", var("ORCH_RUNTIME_S")?)? {
            settings.runtime = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(settings)
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|value| {
            let parsed = value.trim().parse::<T>().ok();
            parsed.ok_or(Error::InvalidValue { key, value })
        })
        .transpose()
}
