//! In-memory database of what services are available to start.
//!
//! Built exactly once, from the scanner's output, before the command
//! interface comes up. Read-only for the lifetime of the host. It is
//! pure data and does no I/O.

use host_protocol::Descriptor;
use log::warn;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ServiceCatalog {
    /// Maps service class name -> descriptor.
    services: HashMap<String, Descriptor>,
}

impl ServiceCatalog {
    /// Builds the catalog from a discovery pass. Keys are unique: if
    /// two modules expose the same class name, the first one wins and
    /// the duplicate is dropped with a warning.
    pub fn build(descriptors: Vec<Descriptor>) -> Self {
        let mut services: HashMap<String, Descriptor> = HashMap::new();
        for descriptor in descriptors {
            if let Some(existing) = services.get(&descriptor.service_class) {
                warn!(
                    "Catalog: duplicate service class '{}' from {:?} ignored (kept {:?})",
                    descriptor.service_class, descriptor.module_path, existing.module_path
                );
                continue;
            }
            services.insert(descriptor.service_class.clone(), descriptor);
        }
        Self { services }
    }

    pub fn get(&self, service_class: &str) -> Option<&Descriptor> {
        self.services.get(service_class)
    }

    /// All known service classes, unordered.
    pub fn list_services(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
