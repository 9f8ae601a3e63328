//! Bookkeeping for running instances.
//!
//! The registry owns the name -> instance map. Every membership
//! operation takes the one inner mutex, so the probe-and-reserve
//! sequence in `reserve` can never interleave with another start's
//! identical sequence. Context creation itself happens outside the
//! lock: a start first reserves a name, spawns, then commits or aborts
//! the reservation.

use crate::runtime::ContextHandle;
use chrono::{DateTime, Utc};
use host_protocol::{Descriptor, InstanceInfo};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Cap on the `Foo`, `Foo[1]`, `Foo[2]`, ... disambiguation probe.
pub const MAX_NAME_ATTEMPTS: usize = 1024;

#[derive(Debug)]
pub struct RunningInstance {
    pub name: String,
    pub descriptor: Descriptor,
    pub handle: ContextHandle,
    pub started_at: DateTime<Utc>,
}

impl RunningInstance {
    pub fn info(&self) -> InstanceInfo {
        InstanceInfo {
            name: self.name.clone(),
            service_class: self.descriptor.service_class.clone(),
            pid: self.handle.pid,
            started_at: self.started_at,
        }
    }
}

#[derive(Default)]
struct Inner {
    instances: HashMap<String, RunningInstance>,
    /// Names handed out by `reserve` whose start is still in flight.
    reserved: HashSet<String>,
}

#[derive(Default)]
pub struct InstanceRegistry {
    inner: Mutex<Inner>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically computes and reserves a free instance name for
    /// `service_class`: the base name first, then `name[1]`, `name[2]`,
    /// ... on collision with running or in-flight instances. Returns
    /// None once the attempt bound is exceeded.
    pub fn reserve(&self, service_class: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let mut name = service_class.to_string();
        let mut n = 0;
        while inner.instances.contains_key(&name) || inner.reserved.contains(&name) {
            n += 1;
            if n >= MAX_NAME_ATTEMPTS {
                return None;
            }
            name = format!("{}[{}]", service_class, n);
        }
        inner.reserved.insert(name.clone());
        Some(name)
    }

    /// Converts a reservation into a tracked instance.
    pub fn commit(&self, instance: RunningInstance) {
        let mut inner = self.inner.lock().unwrap();
        inner.reserved.remove(&instance.name);
        inner.instances.insert(instance.name.clone(), instance);
    }

    /// Releases a reservation whose start failed. The registry ends up
    /// exactly as it was before the reservation.
    pub fn abort(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.reserved.remove(name);
    }

    pub fn handle(&self, name: &str) -> Option<ContextHandle> {
        let inner = self.inner.lock().unwrap();
        inner.instances.get(name).map(|i| i.handle.clone())
    }

    pub fn remove(&self, name: &str) -> Option<RunningInstance> {
        let mut inner = self.inner.lock().unwrap();
        inner.instances.remove(name)
    }

    /// Snapshot of the tracked instance names.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.instances.keys().cloned().collect()
    }

    /// Snapshot of the public views of all tracked instances.
    pub fn infos(&self) -> Vec<InstanceInfo> {
        let inner = self.inner.lock().unwrap();
        inner.instances.values().map(|i| i.info()).collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn instance(name: &str, pid: u32) -> RunningInstance {
        RunningInstance {
            name: name.to_string(),
            descriptor: Descriptor {
                service_class: "Foo".to_string(),
                module_path: PathBuf::from("foo.svc"),
                entry: "start".to_string(),
                search_paths: vec![],
                startup_params: ("a".to_string(), "b".to_string()),
                config_file: String::new(),
            },
            handle: ContextHandle {
                pid,
                control_port: 5900,
            },
            started_at: Utc::now(),
        }
    }

    #[test]
    fn reserves_base_name_then_suffixed_names() {
        let registry = InstanceRegistry::new();
        assert_eq!(registry.reserve("Foo").unwrap(), "Foo");
        assert_eq!(registry.reserve("Foo").unwrap(), "Foo[1]");

        registry.commit(instance("Foo", 10));
        registry.commit(instance("Foo[1]", 11));
        assert_eq!(registry.reserve("Foo").unwrap(), "Foo[2]");
    }

    #[test]
    fn aborted_reservation_frees_the_name() {
        let registry = InstanceRegistry::new();
        let name = registry.reserve("Foo").unwrap();
        registry.abort(&name);
        assert_eq!(registry.reserve("Foo").unwrap(), "Foo");
    }

    #[test]
    fn removed_name_is_immediately_reusable() {
        let registry = InstanceRegistry::new();
        let name = registry.reserve("Foo").unwrap();
        registry.commit(instance(&name, 10));
        assert!(registry.remove("Foo").is_some());
        assert_eq!(registry.reserve("Foo").unwrap(), "Foo");
    }

    #[test]
    fn reservation_probe_is_bounded() {
        let registry = InstanceRegistry::new();
        for _ in 0..MAX_NAME_ATTEMPTS {
            if registry.reserve("Foo").is_none() {
                return; // bound hit before exhausting the loop, fine
            }
        }
        assert!(registry.reserve("Foo").is_none());
    }

    #[test]
    fn remove_unknown_name_is_a_noop() {
        let registry = InstanceRegistry::new();
        registry.commit(instance("Foo", 10));
        assert!(registry.remove("Bar").is_none());
        assert_eq!(registry.len(), 1);
    }
}
