use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::discovery::EventSource;
use crate::registry::ContainerEvent;

use super::Control;

/// Forwards container events from a blocking source to the update task.
///
/// Reading happens outside the registry lock; the update task applies the
/// queued events under its own lock.
pub struct WatchTask {
    source: Box<dyn EventSource>,
    sender: Sender<ContainerEvent>,
    control: Arc<Control>,
}

impl WatchTask {
    pub fn new(source: Box<dyn EventSource>, sender: Sender<ContainerEvent>, control: Arc<Control>) -> Self {
        Self {
            source,
            sender,
            control,
        }
    }

    /// Reads events until stopped, the stream ends or the update task is gone.
    /// Returns the number of forwarded events.
    pub fn run(mut self) -> usize {
        let mut forwarded = 0;
        log::info!("container event watcher started");

        while !self.control.is_stopped() {
            match self.source.next_event() {
                Ok(Some(event)) => {
                    log::debug!("container {:.12} {:?}", event.id, event.kind);
                    if self.sender.send(event).is_err() {
                        log::debug!("event receiver gone");
                        break;
                    }
                    forwarded += 1;
                }
                Ok(None) => {
                    log::info!("container event stream ended");
                    break;
                }
                Err(err) if err.is_malformed() => {
                    log::warn!("discarding container event: {err}");
                }
                Err(err) => {
                    log::error!("container event stream failed: {err}");
                    break;
                }
            }
        }

        log::info!("container event watcher stopped after {forwarded} events");
        forwarded
    }
}
