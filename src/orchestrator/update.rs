use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::discovery::PidEnumerator;
use crate::registry::{self, ContainerEvent, PassReport, SharedRegistry};
use crate::sched::SchedQuery;

use super::{Control, Result};

/// Periodic reconciliation of the tracked processes.
///
/// Each round enumerates processes without holding the registry lock, then
/// applies queued container events and reconciles under one lock.
pub struct UpdateTask {
    registry: SharedRegistry,
    enumerator: Box<dyn PidEnumerator>,
    query: Arc<dyn SchedQuery>,
    events: Option<Receiver<ContainerEvent>>,
    control: Arc<Control>,
    tag: String,
    max_pids: usize,
    interval: Duration,
    runtime: Option<Duration>,
}

impl UpdateTask {
    pub fn new(
        registry: SharedRegistry,
        enumerator: Box<dyn PidEnumerator>,
        query: Arc<dyn SchedQuery>,
        control: Arc<Control>,
        settings: &Settings,
    ) -> Self {
        Self {
            registry,
            enumerator,
            query,
            events: None,
            control,
            tag: settings.pid_tag.clone(),
            max_pids: settings.max_pids,
            interval: settings.interval,
            runtime: settings.runtime,
        }
    }

    /// Sets the queue fed by a [`super::WatchTask`].
    pub fn with_events(mut self, events: Receiver<ContainerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Runs one round. Returns `None` if enumeration failed and the pass was
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot grow or its lock is poisoned.
    pub fn step(&mut self) -> Result<Option<PassReport>> {
        let observed = match self.enumerator.enumerate_pids(&self.tag, self.max_pids) {
            Ok(observed) => Some(observed),
            Err(err) => {
                log::warn!("skipping reconciliation, enumeration failed: {err}");
                None
            }
        };

        let mut registry = self.registry.lock()?;
        let mut closed = false;
        if let Some(events) = &self.events {
            loop {
                let event = match events.try_recv() {
                    Ok(event) => event,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::debug!("container event queue closed");
                        closed = true;
                        break;
                    }
                };
                match registry.apply_event(&event) {
                    Ok(outcome) => log::debug!("event for {:.12}: {outcome:?}", event.id),
                    Err(registry::Error::Allocation(err)) => {
                        return Err(registry::Error::Allocation(err).into());
                    }
                    Err(err) => log::warn!("dropping container event {:.12}: {err}", event.id),
                }
            }
        }
        if closed {
            self.events = None;
        }

        let Some(observed) = observed else {
            return Ok(None);
        };
        let report = registry.reconcile(observed, self.query.as_ref())?;
        if !report.is_unchanged() {
            log::debug!(
                "reconciled: {} inserted, {} dropped, {} tracked",
                report.inserted,
                report.dropped,
                registry.nodes.len()
            );
        }
        Ok(Some(report))
    }

    /// Loops until the control flag is stopped or the configured runtime has
    /// elapsed.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of [`UpdateTask::step`]; the task's own
    /// flag is stopped before returning.
    pub fn run(mut self) -> Result<()> {
        let start = Instant::now();
        log::info!("update task started, tracking `{}`", self.tag);

        while !self.control.is_stopped() {
            if let Err(err) = self.step() {
                self.control.stop();
                return Err(err);
            }
            if self.runtime.is_some_and(|runtime| start.elapsed() >= runtime) {
                log::info!("runtime elapsed, stopping");
                self.control.stop();
                break;
            }
            std::thread::sleep(self.interval);
        }

        log::info!("update task stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;

    use super::*;
    use crate::discovery;
    use crate::registry::{EventKind, ObservedPid, Registry};
    use crate::sched::{self, SchedAttr};
    use crate::Pid;

    /// Replays scripted enumeration results, repeating the last one.
    struct Script(Mutex<Vec<discovery::Result<Vec<Pid>>>>);

    impl Script {
        fn new(rounds: Vec<discovery::Result<Vec<Pid>>>) -> Box<Self> {
            let mut rounds = rounds;
            rounds.reverse();
            Box::new(Self(Mutex::new(rounds)))
        }
    }

    impl PidEnumerator for Script {
        fn enumerate_pids(&self, _tag: &str, max: usize) -> discovery::Result<Vec<ObservedPid>> {
            let mut rounds = self.0.lock().unwrap();
            let round = if rounds.len() > 1 {
                rounds.pop().unwrap()
            } else {
                match rounds.last().unwrap() {
                    Ok(pids) => Ok(pids.clone()),
                    Err(_) => Err(discovery::Error::NoStdout("script".to_owned())),
                }
            };
            round.map(|pids| {
                pids.into_iter()
                    .take(max)
                    .map(|pid| ObservedPid {
                        pid,
                        psig: Some("bash".to_owned()),
                        contid: Some("c0ffee000000".to_owned()),
                    })
                    .collect()
            })
        }
    }

    struct NoQuery;

    impl SchedQuery for NoQuery {
        fn get_sched_attr(&self, _pid: Pid) -> sched::Result<SchedAttr> {
            Ok(SchedAttr::default())
        }

        fn get_rr_interval(&self, _pid: Pid) -> sched::Result<Duration> {
            Ok(Duration::ZERO)
        }

        fn get_runtime(&self, _pid: Pid) -> sched::Result<u64> {
            Ok(0)
        }
    }

    fn settings() -> Settings {
        Settings {
            interval: Duration::from_millis(1),
            ..Settings::default()
        }
    }

    fn task(registry: &SharedRegistry, script: Box<Script>) -> UpdateTask {
        UpdateTask::new(
            Arc::clone(registry),
            script,
            Arc::new(NoQuery),
            Arc::new(Control::new()),
            &settings(),
        )
    }

    fn add_event() -> ContainerEvent {
        ContainerEvent {
            kind: EventKind::Add,
            name: "app".to_owned(),
            id: "c0ffee000000".to_owned(),
            image: "app:1".to_owned(),
            timestamp_ns: 1,
        }
    }

    #[test]
    fn test_step_reconciles() {
        let registry = Registry::default().into_shared();
        let mut task = task(&registry, Script::new(vec![Ok(vec![3, 1]), Ok(vec![1])]));

        let report = task.step().unwrap().unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(registry.lock().unwrap().nodes.pids(), vec![1, 3]);

        let report = task.step().unwrap().unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(registry.lock().unwrap().nodes.pids(), vec![1]);
    }

    #[test]
    fn test_enumeration_error_keeps_nodes() {
        let registry = Registry::default().into_shared();
        let failure = Err(discovery::Error::NoStdout("script".to_owned()));
        let mut task = task(&registry, Script::new(vec![Ok(vec![5]), failure]));

        task.step().unwrap();
        assert_eq!(task.step().unwrap(), None);
        assert_eq!(registry.lock().unwrap().nodes.pids(), vec![5]);
    }

    #[test]
    fn test_events_are_applied_before_reconcile() {
        let registry = Registry::default().into_shared();
        let (tx, rx) = mpsc::channel();
        let mut task = task(&registry, Script::new(vec![Ok(vec![9])])).with_events(rx);

        tx.send(add_event()).unwrap();
        task.step().unwrap();

        let registry = registry.lock().unwrap();
        assert!(registry.config.container("c0ffee000000").is_some());
        // the new node resolved against the container created by the event
        assert!(registry.param_of(9).is_some());
    }

    #[test]
    fn test_invalid_event_is_dropped() {
        let registry = Registry::default().into_shared();
        let (tx, rx) = mpsc::channel();
        let mut task = task(&registry, Script::new(vec![Ok(vec![])])).with_events(rx);

        tx.send(ContainerEvent {
            id: String::new(),
            ..add_event()
        })
        .unwrap();
        drop(tx);
        assert!(task.step().is_ok());
        assert!(task.events.is_none());
        assert_eq!(registry.lock().unwrap().config.container_count(), 0);
    }

    #[test]
    fn test_run_stops_after_runtime() {
        let registry = Registry::default().into_shared();
        let control = Arc::new(Control::new());
        let settings = Settings {
            runtime: Some(Duration::from_millis(20)),
            ..settings()
        };
        let task = UpdateTask::new(
            Arc::clone(&registry),
            Script::new(vec![Ok(vec![1, 2])]),
            Arc::new(NoQuery),
            Arc::clone(&control),
            &settings,
        );

        task.run().unwrap();
        assert!(control.is_stopped());
        assert_eq!(registry.lock().unwrap().nodes.pids(), vec![1, 2]);
    }

    #[test]
    fn test_run_exits_on_stop() {
        let registry = Registry::default().into_shared();
        let control = Arc::new(Control::new());
        let task = UpdateTask::new(
            registry,
            Script::new(vec![Ok(vec![1])]),
            Arc::new(NoQuery),
            Arc::clone(&control),
            &settings(),
        );
        let handle = std::thread::spawn(move || task.run());
        std::thread::sleep(Duration::from_millis(10));
        control.stop();
        assert!(handle.join().unwrap().is_ok());
    }
}
