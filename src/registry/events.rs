//! Container lifecycle events applied to the configuration store.

use crate::container::ContainerID;

use super::{ConfigStore, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Remove,
    Pending,
}

/// A decoded container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    pub kind: EventKind,
    pub name: String,
    pub id: String,
    pub image: String,
    pub timestamp_ns: u64,
}

/// What [`apply_event`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Created,
    Updated,
    /// A container marked removed was added again.
    Revived,
    Removed { detached: usize },
    Ignored,
}

/// Applies one event to `store`.
///
/// # Errors
///
/// Returns [`super::Error::Container`] for an invalid id in an `Add` event and
/// [`super::Error::Allocation`] if the container cannot be stored.
pub fn apply_event(store: &mut ConfigStore, event: &ContainerEvent) -> Result<EventOutcome> {
    match event.kind {
        EventKind::Add => {
            let outcome = match store.position_short(&event.id, true) {
                Some(pos) => {
                    let Some(container) = store.container_at_mut(pos) else {
                        return Ok(EventOutcome::Ignored);
                    };
                    let outcome = if container.is_removed() {
                        container.revive();
                        EventOutcome::Revived
                    } else {
                        EventOutcome::Updated
                    };
                    set_metadata(container, event);
                    outcome
                }
                None => {
                    let container = store.cpush(ContainerID::new(&event.id)?)?;
                    set_metadata(container, event);
                    EventOutcome::Created
                }
            };
            log::info!("container {:.12} ({}) added: {outcome:?}", event.id, event.name);
            Ok(outcome)
        }
        EventKind::Remove => match store.mark_removed(&event.id) {
            Some(detached) => {
                log::info!(
                    "container {:.12} ({}) removed, {detached} configurations detached",
                    event.id,
                    event.name
                );
                Ok(EventOutcome::Removed { detached })
            }
            None => {
                log::debug!("removal of unknown container {:.12}", event.id);
                Ok(EventOutcome::Ignored)
            }
        },
        EventKind::Pending => Ok(EventOutcome::Ignored),
    }
}

fn set_metadata(container: &mut super::Container, event: &ContainerEvent) {
    if !event.name.is_empty() {
        container.name = Some(event.name.clone());
    }
    if !event.image.is_empty() {
        container.image = Some(event.image.clone());
    }
}
