//! Auto-start of declared services at host initialization.
//!
//! One detached task per flagged entry; initialization never blocks on
//! them and no ordering holds between them.

use crate::config::DeclaredService;
use crate::runtime::IsolationBackend;
use crate::supervisor::Supervisor;
use log::{debug, error, info};
use std::sync::Arc;

pub fn schedule<B: IsolationBackend + 'static>(
    supervisor: &Arc<Supervisor<B>>,
    services: &[DeclaredService],
) {
    for service in services.iter().filter(|s| s.auto_start) {
        let supervisor = supervisor.clone();
        let service_class = service.service_class.clone();
        tokio::spawn(async move {
            debug!("Autostart: [{}] starting...", service_class);
            match supervisor.start(&service_class).await {
                Ok(message) => info!("Autostart: [{}] started: {}", service_class, message),
                Err(e) => error!("Autostart: [{}] failed: {}", service_class, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCatalog;
    use crate::runtime::{ContextHandle, TeardownRefused};
    use anyhow::Result;
    use async_trait::async_trait;
    use host_protocol::Descriptor;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingBackend {
        launched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IsolationBackend for CountingBackend {
        async fn launch(&self, name: &str, _d: &Descriptor) -> Result<ContextHandle> {
            self.launched.lock().unwrap().push(name.to_string());
            Ok(ContextHandle {
                pid: 1,
                control_port: 0,
            })
        }

        async fn teardown(&self, _h: &ContextHandle) -> Result<(), TeardownRefused> {
            Ok(())
        }

        async fn live_contexts(&self) -> Vec<u32> {
            vec![1]
        }
    }

    fn declared(class: &str, auto_start: bool) -> DeclaredService {
        DeclaredService {
            service_class: class.to_string(),
            auto_start,
        }
    }

    #[tokio::test]
    async fn only_flagged_services_are_started() {
        let backend = Arc::new(CountingBackend::default());
        let catalog = ServiceCatalog::build(vec![
            Descriptor {
                service_class: "Auto".to_string(),
                module_path: PathBuf::from("auto.svc"),
                entry: "start".to_string(),
                search_paths: vec![],
                startup_params: ("a".to_string(), "b".to_string()),
                config_file: String::new(),
            },
            Descriptor {
                service_class: "Manual".to_string(),
                module_path: PathBuf::from("manual.svc"),
                entry: "start".to_string(),
                search_paths: vec![],
                startup_params: ("a".to_string(), "b".to_string()),
                config_file: String::new(),
            },
        ]);
        let supervisor = Arc::new(Supervisor::new(catalog, backend.clone()));

        schedule(
            &supervisor,
            &[
                declared("Auto", true),
                declared("Manual", false),
                declared("NotDiscovered", true), // fails, but only in its own task
            ],
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*backend.launched.lock().unwrap(), vec!["Auto"]);
    }
}
