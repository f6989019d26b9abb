use super::{ConfigStore, Error, Label, Node, PidConfig, PidConfigId, Result};

/// Binds `node` to its configuration entry.
///
/// Resolution order:
/// 1. the newest active container matching the node's container id on the
///    short id, then an entry of its association list with the exact signature;
/// 2. with a matching container but no matching entry, a placeholder entry
///    carrying the container's default attributes is created in both the
///    container and the flat list;
/// 3. without a matching container, the newest configured entry of the flat
///    list with the exact signature, regardless of the container it belongs
///    to. Placeholders never match here.
///
/// On success the node's labels are switched to the strings held by the
/// store where they are equal.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if nothing matches, leaving `node` untouched,
/// and [`Error::Allocation`] if the placeholder cannot be stored.
pub fn find_params(node: &mut Node, store: &mut ConfigStore) -> Result<PidConfigId> {
    let matched = node
        .contid
        .as_deref()
        .and_then(|contid| store.find_container_short(contid));

    let id = match matched {
        Some(pos) => {
            let container = store.container_at(pos).ok_or(Error::NotFound)?;
            let existing = node.psig.as_deref().and_then(|psig| {
                container.pids().find(|id| {
                    store.config(*id).and_then(|config| config.psig.as_deref()) == Some(psig)
                })
            });

            match existing {
                Some(id) => id,
                None => {
                    log::debug!(
                        "no configuration for pid {} in container {}, creating placeholder",
                        node.pid,
                        container.contid.short()
                    );
                    let placeholder = PidConfig {
                        psig: node.psig.as_ref().map(Label::to_arc),
                        attr: container.attr,
                        placeholder: true,
                        ..PidConfig::default()
                    };
                    store.pcpush_at(pos, placeholder)?
                }
            }
        }
        None => {
            let psig = node.psig.as_deref().ok_or(Error::NotFound)?;
            let id = store.find_config(psig).ok_or(Error::NotFound)?;
            log::warn!(
                "assigning configuration `{psig}` to pid {} outside its container",
                node.pid
            );
            id
        }
    };

    node.param = Some(id);
    adopt_labels(node, store, id, matched);
    Ok(id)
}

fn adopt_labels(node: &mut Node, store: &ConfigStore, id: PidConfigId, container: Option<usize>) {
    if let Some(shared) = store.config(id).and_then(|config| config.psig.as_ref()) {
        if node.psig.as_deref() == Some(&**shared) {
            node.psig = Some(Label::Borrowed(shared.clone()));
        }
    }

    if let Some(container) = container.and_then(|pos| store.container_at(pos)) {
        if node.contid.as_deref() == Some(container.contid.as_ref()) {
            node.contid = Some(Label::Borrowed(container.contid.to_arc()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::container::ContainerID;
    use crate::registry::NodeStore;
    use crate::sched::{SCHED_FIFO, SchedAttr};

    const CONTID: &str = "abc123456789";
    const FULL_ID: &str = "abc123456789feedfacefeedfacefeedfacefeedfacefeedfacefeedfaceabcd";

    fn fifo() -> SchedAttr {
        SchedAttr {
            policy: SCHED_FIFO,
            priority: 10,
            ..SchedAttr::default()
        }
    }

    /// Collects warnings emitted by any test in this process.
    struct Warnings(Mutex<Vec<String>>);

    impl log::Log for Warnings {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.0.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: Warnings = Warnings(Mutex::new(Vec::new()));

    fn capture_warnings() {
        let _ = log::set_logger(&WARNINGS);
        log::set_max_level(log::LevelFilter::Warn);
    }

    fn warned_about(needle: &str) -> bool {
        WARNINGS.0.lock().unwrap().iter().any(|line| line.contains(needle))
    }

    fn node<'a>(store: &'a mut NodeStore, psig: &str, contid: Option<&str>) -> &'a mut Node {
        store
            .push(1, Some(psig.into()), contid.map(Label::from))
            .unwrap()
    }

    #[test]
    fn test_container_and_signature_match() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap();
        let expected = config.pcpush(CONTID, PidConfig::new("worker-1", fifo())).unwrap();

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker-1", Some(FULL_ID));
        assert_eq!(find_params(node, &mut config).unwrap(), expected);
        assert_eq!(node.param, Some(expected));
        assert_eq!(config.config_count(), 1);
    }

    #[test]
    fn test_container_match_creates_placeholder() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap();
        config.pcpush(CONTID, PidConfig::new("worker-1", fifo())).unwrap();

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker-7", Some(FULL_ID));
        let id = find_params(node, &mut config).unwrap();

        assert_eq!(node.param, Some(id));
        assert_eq!(config.config_count(), 2);
        assert_eq!(config.configs().next().map(|(first, _)| first), Some(id));
        let container = config.container(CONTID).unwrap();
        assert_eq!(container.pids().next(), Some(id));
        let placeholder = config.config(id).unwrap();
        assert!(placeholder.placeholder);
        assert!(!placeholder.attr.has_data());

        // a second process with the same signature reuses the placeholder
        let again = nodes.push(2, Some("worker-7".into()), Some(FULL_ID.into())).unwrap();
        assert_eq!(find_params(again, &mut config).unwrap(), id);
        assert_eq!(config.config_count(), 2);
    }

    #[test]
    fn test_placeholder_takes_container_defaults() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap().attr = fifo();

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker", Some(FULL_ID));
        let id = find_params(node, &mut config).unwrap();
        let placeholder = config.config(id).unwrap();
        assert!(placeholder.placeholder);
        assert_eq!(placeholder.attr, fifo());
    }

    #[test]
    fn test_placeholder_does_not_shadow_flat_entry() {
        let mut config = ConfigStore::new();
        let configured = config.push_config(PidConfig::new("worker", fifo())).unwrap();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap();

        let mut nodes = NodeStore::new();
        let contained = node(&mut nodes, "worker", Some(FULL_ID));
        let placeholder = find_params(contained, &mut config).unwrap();
        assert_ne!(placeholder, configured);

        let plain = nodes.push(2, Some("worker".into()), None).unwrap();
        assert_eq!(find_params(plain, &mut config).unwrap(), configured);
        assert_eq!(config.config(configured).unwrap().attr.policy, SCHED_FIFO);
    }

    #[test]
    fn test_signature_fallback_across_containers() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new("other0000000").unwrap()).unwrap();
        let id = config.pcpush("other0000000", PidConfig::new("worker-1", fifo())).unwrap();

        capture_warnings();
        let mut nodes = NodeStore::new();
        let node = nodes
            .push(4242, Some("worker-1".into()), Some(FULL_ID.into()))
            .unwrap();
        assert_eq!(find_params(node, &mut config).unwrap(), id);
        assert_eq!(config.config_count(), 1);
        assert!(warned_about("to pid 4242 outside its container"));
    }

    #[test]
    fn test_signature_match_without_container() {
        let mut config = ConfigStore::new();
        config.push_config(PidConfig::new("sleep 10", fifo())).unwrap();
        let id = config.push_config(PidConfig::new("sleep 10", fifo())).unwrap();

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "sleep 10", None);
        assert_eq!(find_params(node, &mut config).unwrap(), id);
    }

    #[test]
    fn test_not_found_leaves_node_unbound() {
        let mut config = ConfigStore::new();
        config.push_config(PidConfig::new("other", fifo())).unwrap();

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker", None);
        assert!(matches!(find_params(node, &mut config), Err(Error::NotFound)));
        assert!(node.param.is_none());
        assert!(!node.psig.as_ref().unwrap().is_borrowed());

        let unsigned = nodes.push(2, None, None).unwrap();
        assert!(matches!(find_params(unsigned, &mut config), Err(Error::NotFound)));
    }

    #[test]
    fn test_removed_container_is_skipped() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap();
        config.mark_removed(CONTID);

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker", Some(CONTID));
        assert!(matches!(find_params(node, &mut config), Err(Error::NotFound)));
        assert_eq!(config.config_count(), 0);
    }

    #[test]
    fn test_bound_node_borrows_store_strings() {
        let mut config = ConfigStore::new();
        config.cpush(ContainerID::new(CONTID).unwrap()).unwrap();
        let id = config.pcpush(CONTID, PidConfig::new("worker", fifo())).unwrap();
        let shared = Arc::clone(config.config(id).unwrap().psig.as_ref().unwrap());
        assert_eq!(Arc::strong_count(&shared), 2);

        let mut nodes = NodeStore::new();
        let node = node(&mut nodes, "worker", Some(CONTID));
        find_params(node, &mut config).unwrap();
        assert!(node.psig.as_ref().unwrap().is_borrowed());
        assert!(node.contid.as_ref().unwrap().is_borrowed());
        assert_eq!(Arc::strong_count(&shared), 3);

        // dropping the node releases its reference only
        nodes.pop();
        assert_eq!(Arc::strong_count(&shared), 2);
        assert_eq!(config.config(id).unwrap().psig.as_deref(), Some("worker"));
    }
}
