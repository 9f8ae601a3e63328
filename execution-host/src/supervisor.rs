//! The lifecycle surface of the host: start, stop, enumerate, shut
//! down, and forward exec payloads into running instances.
//!
//! The supervisor reconciles two sources of truth: its own registry
//! (what it believes it started) and the backend's enumeration of
//! contexts that are actually alive. Enumeration answers are always the
//! intersection of the two, so an instance that died behind the
//! supervisor's back is never reported as running.

use crate::catalog::ServiceCatalog;
use crate::error::{StartError, StopError};
use crate::registry::{InstanceRegistry, RunningInstance, MAX_NAME_ATTEMPTS};
use crate::runtime::IsolationBackend;
use anyhow::{Context, Result};
use chrono::Utc;
use host_protocol::transport::{TcpClientDuplex, TransportDuplex};
use host_protocol::InstanceInfo;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub struct Supervisor<B: IsolationBackend> {
    catalog: ServiceCatalog,
    registry: InstanceRegistry,
    backend: Arc<B>,
}

impl<B: IsolationBackend> Supervisor<B> {
    pub fn new(catalog: ServiceCatalog, backend: Arc<B>) -> Self {
        Self {
            catalog,
            registry: InstanceRegistry::new(),
            backend,
        }
    }

    /// Starts a new instance of `service_class`.
    ///
    /// On success the returned message is the class name, not the
    /// disambiguated instance name. The name reservation is atomic with
    /// respect to concurrent starts; context creation runs outside any
    /// registry lock and the reservation is committed or rolled back
    /// afterwards.
    pub async fn start(&self, service_class: &str) -> Result<String, StartError> {
        let descriptor = match self.catalog.get(service_class) {
            Some(d) => d.clone(),
            None => {
                debug!(
                    "Supervisor: '{}' is not a start target",
                    service_class
                );
                return Err(StartError::UnknownService(service_class.to_string()));
            }
        };

        let name = self
            .registry
            .reserve(service_class)
            .ok_or_else(|| StartError::NamesExhausted(service_class.to_string(), MAX_NAME_ATTEMPTS))?;

        info!("Supervisor: starting '{}' as '{}'", service_class, name);
        match self.backend.launch(&name, &descriptor).await {
            Ok(handle) => {
                self.registry.commit(RunningInstance {
                    name,
                    descriptor,
                    handle,
                    started_at: Utc::now(),
                });
                Ok(service_class.to_string())
            }
            Err(e) => {
                self.registry.abort(&name);
                error!(
                    "Supervisor: context creation for '{}' failed: {:#}",
                    service_class, e
                );
                Err(StartError::ContextCreation(e))
            }
        }
    }

    /// Stops the instance named `instance`. A refused teardown leaves
    /// the registry entry intact: the instance is stuck but remains
    /// enumerable, and there is no automatic retry.
    pub async fn stop(&self, instance: &str) -> Result<(), StopError> {
        let handle = match self.registry.handle(instance) {
            Some(h) => h,
            None => {
                debug!("Supervisor: '{}' is not a stop target", instance);
                return Err(StopError::UnknownInstance(instance.to_string()));
            }
        };

        info!("Supervisor: stopping '{}'", instance);
        match self.backend.teardown(&handle).await {
            Ok(()) => {
                self.registry.remove(instance);
                Ok(())
            }
            Err(_) => {
                error!(
                    "Supervisor: '{}' refused teardown, keeping it tracked",
                    instance
                );
                Err(StopError::TeardownRefused(instance.to_string()))
            }
        }
    }

    /// Instances that are both tracked by the registry and confirmed
    /// alive by the runtime.
    pub async fn list_running(&self) -> Vec<InstanceInfo> {
        let live: HashSet<u32> = self.backend.live_contexts().await.into_iter().collect();
        self.registry
            .infos()
            .into_iter()
            .filter(|info| live.contains(&info.pid))
            .collect()
    }

    /// All discovered service classes, unordered.
    pub fn list_available(&self) -> Vec<String> {
        self.catalog.list_services()
    }

    /// Stops every instance present when the snapshot is taken. Starts
    /// racing the snapshot are not captured by this pass.
    pub async fn shutdown_all(&self) {
        let names = self.registry.names();
        info!("Supervisor: shutting down {} instance(s)", names.len());
        for name in names {
            if let Err(e) = self.stop(&name).await {
                warn!("Supervisor: shutdown of '{}' failed: {}", name, e);
            }
        }
    }

    /// Forwards an opaque payload to a running instance over its
    /// control port and returns the raw reply. Payload semantics belong
    /// to the target service.
    pub async fn exec(&self, target: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let handle = self
            .registry
            .handle(target)
            .with_context(|| format!("Instance '{}' is not running", target))?;

        let addr = format!("127.0.0.1:{}", handle.control_port);
        let mut transport = TcpClientDuplex::connect(&addr)
            .await
            .with_context(|| format!("Failed to reach '{}' at {}", target, addr))?;
        transport.send_bytes(payload).await?;
        transport.recv_bytes().await
    }
}
