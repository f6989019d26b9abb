//! Sched Orchestrator: tracks the processes of a given name, correlates them
//! with a persisted scheduling configuration and keeps runtime statistics.
//!
//! The core is the [`registry`]: a sorted list of runtime nodes reconciled
//! against periodic `/proc` scans, and the configuration store the nodes are
//! bound to. The [`orchestrator`] tasks drive it from separate threads.
use std::path::PathBuf;
use std::sync::{Arc, mpsc};

use config::Settings;
use discovery::{DockerEvents, ProcScanner};
use error::ResultOkLogExt;
use kernvar::{KernelVars, KernelVersion};
use orchestrator::{Control, ManageTask, UpdateTask, WatchTask};
use sched::{ProcSchedQuery, SchedQuery};

pub mod config;
pub mod container;
pub mod discovery;
pub mod error;
pub mod fsutil;
pub mod kernvar;
pub mod orchestrator;
pub mod registry;
pub mod sched;

/// Operating system process id.
pub type Pid = i32;

const CPU_SYSFS_PREFIX: &str = "/sys/devices/system/cpu/";

/// Runs the orchestrator until the configured runtime elapsed or a task fails.
///
/// Settings come from the environment (see [`Settings::from_env`]).
///
/// # Errors
///
/// Possible errors include:
/// - Invalid environment settings.
/// - An unreadable or invalid configuration file.
/// - Allocation failure inside the registry, which stops all tasks.
/// - Failure to spawn a task thread.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    log::debug!("settings: {settings:?}");

    prepare_kernel(&kernvar::FsKernelVars, &settings);

    let config = match &settings.config_path {
        Some(path) => config::load_file(path)?,
        None => registry::ConfigStore::new(),
    };
    let registry = registry::Registry::new(config).into_shared();
    let proc_root = PathBuf::from(&settings.proc_prefix);
    let query: Arc<dyn SchedQuery> = Arc::new(ProcSchedQuery::new(&proc_root));

    let update_control = Arc::new(Control::new());
    let manage_control = Arc::new(Control::new());
    let watch_control = Arc::new(Control::new());

    let mut update = UpdateTask::new(
        Arc::clone(&registry),
        Box::new(ProcScanner::new(&proc_root)),
        Arc::clone(&query),
        Arc::clone(&update_control),
        &settings,
    );

    let mut watcher = None;
    if let Some(command) = &settings.docker_events {
        match DockerEvents::spawn(command) {
            Ok(events) => {
                let (tx, rx) = mpsc::channel();
                update = update.with_events(rx);
                let terminator = events.terminator();
                let task = WatchTask::new(Box::new(events), tx, Arc::clone(&watch_control));
                let handle = orchestrator::spawn("watch", move || task.run())?;
                watcher = Some((handle, terminator));
            }
            Err(err) => log::warn!("container events disabled: {err}"),
        }
    }

    let manage = ManageTask::new(
        Arc::clone(&registry),
        query,
        Arc::clone(&manage_control),
        settings.manage_interval,
    )
    .stop_on_failure(Arc::clone(&update_control));
    let manage_handle = orchestrator::spawn("manage", move || manage.run())?;
    let update_handle = orchestrator::spawn("update", move || update.run())?;

    let update_result = orchestrator::join("update", update_handle);
    manage_control.stop();
    watch_control.stop();
    if let Some((handle, terminator)) = watcher {
        terminator.terminate();
        if handle.join().is_err() {
            log::error!("watch thread panicked");
        }
    }
    let manage_result = orchestrator::join("manage", manage_handle);

    update_result?;
    manage_result?;
    log::info!("orchestrator stopped");
    Ok(())
}

/// Checks kernel support and applies the configured real-time throttle.
///
/// Failures are logged and never abort the start.
fn prepare_kernel(vars: &impl KernelVars, settings: &Settings) -> Option<KernelVersion> {
    let sys_kernel = format!("{}sys/kernel/", settings.proc_prefix);

    let version = vars
        .read_param(&sys_kernel, "osrelease")
        .ok_warn("reading kernel release")
        .map(|release| {
            let version = kernvar::check_kernel(&release);
            if version < KernelVersion::V4_13 {
                log::warn!("kernel {release} lacks full deadline scheduling support ({version:?})");
            } else {
                log::info!("running on kernel {release}");
            }
            version
        });

    if let Some(online) = vars
        .read_param(CPU_SYSFS_PREFIX, "online")
        .ok_warn("reading online cpus")
    {
        match kernvar::parse_cpumask(&online) {
            Ok(Some(cpus)) => log::info!("{} cpus online: {}", cpus.len(), kernvar::format_cpumask(&cpus)),
            Ok(None) => log::warn!("no cpus reported online"),
            Err(err) => log::warn!("reading online cpus: {err}"),
        }
    }

    if let Some(runtime) = settings.rt_runtime_us {
        vars.write_param(
            &sys_kernel,
            "sched_rt_runtime_us",
            &runtime.to_string(),
            settings.dry_run,
        )
        .ok_log("setting real-time throttle");
    }

    version
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_tree(release: &str) -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let sys_kernel = dir.path().join("sys/kernel");
        std::fs::create_dir_all(&sys_kernel).unwrap();
        std::fs::write(sys_kernel.join("osrelease"), format!("{release}\n")).unwrap();
        std::fs::write(sys_kernel.join("sched_rt_runtime_us"), "950000\n").unwrap();
        let settings = Settings {
            proc_prefix: format!("{}/", dir.path().display()),
            rt_runtime_us: Some(-1),
            ..Settings::default()
        };
        (dir, settings)
    }

    fn rt_runtime(dir: &tempfile::TempDir) -> String {
        std::fs::read_to_string(dir.path().join("sys/kernel/sched_rt_runtime_us")).unwrap()
    }

    #[test]
    fn test_prepare_kernel_writes_throttle() {
        let (dir, settings) = proc_tree("6.1.0-13-amd64");
        let version = prepare_kernel(&kernvar::FsKernelVars, &settings);
        assert_eq!(version, Some(KernelVersion::V5_0));
        assert_eq!(rt_runtime(&dir), "-1");
    }

    #[test]
    fn test_prepare_kernel_dry_run() {
        let (dir, mut settings) = proc_tree("4.9.0");
        settings.dry_run = true;
        let version = prepare_kernel(&kernvar::FsKernelVars, &settings);
        assert_eq!(version, Some(KernelVersion::V4_0));
        assert_eq!(rt_runtime(&dir), "950000\n");
    }

    #[test]
    fn test_prepare_kernel_without_proc() {
        let settings = Settings {
            proc_prefix: "/nonexistent/".to_owned(),
            ..Settings::default()
        };
        assert_eq!(prepare_kernel(&kernvar::FsKernelVars, &settings), None);
    }
}
