/// Entry point of the orchestrator.
///
/// Tracks the processes named by `ORCH_PID_TAG`, binds them to the
/// configuration loaded from `ORCH_CONFIG` and follows container events until
/// `ORCH_RUNTIME_S` elapsed or a fatal error occurs.
///
/// # Errors
///
/// Returns an error if the settings or the configuration are invalid, or if a
/// task stops with a fatal error.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info ORCH_PID_TAG=ffmpeg ORCH_CONFIG=/etc/orchestrator.json sched-orchestrator
/// ```
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    sched_orchestrator::run()
}
