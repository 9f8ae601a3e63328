//! Worker-process implementation of the isolation backend.
//!
//! Each started instance is a dedicated child process running the
//! module's declared entry subcommand with the two startup parameters.
//! Search path, configuration file name and control port cross the
//! boundary as environment variables; nothing else is shared with the
//! host.

use crate::runtime::ports::PortAllocator;
use crate::runtime::traits::{ContextHandle, IsolationBackend, TeardownRefused};
use anyhow::{Context, Result};
use async_trait::async_trait;
use host_protocol::Descriptor;
use log::{error, info, warn};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};

pub const ENV_CONTROL_PORT: &str = "EXEC_HOST_CONTROL_PORT";
pub const ENV_SEARCH_PATH: &str = "EXEC_HOST_SEARCH_PATH";
pub const ENV_CONFIG_FILE: &str = "EXEC_HOST_CONFIG_FILE";

struct ManagedChild {
    child: Child,
    control_port: u16,
}

pub struct ProcessBackend {
    /// Map PID -> live child handle. This map, not the supervisor's
    /// registry, is the ground truth of what is actually alive.
    children: Mutex<HashMap<u32, ManagedChild>>,
    ports: Mutex<PortAllocator>,
    grace: Duration,
}

impl ProcessBackend {
    pub fn new(port_start: u16, port_end: u16, grace: Duration) -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
            ports: Mutex::new(PortAllocator::new(port_start, port_end)),
            grace,
        }
    }
}

#[async_trait]
impl IsolationBackend for ProcessBackend {
    async fn launch(
        &self,
        instance_name: &str,
        descriptor: &Descriptor,
    ) -> Result<ContextHandle> {
        let control_port = {
            let mut ports = self.ports.lock().unwrap();
            ports
                .allocate()
                .context("Control port range exhausted")?
        };

        let (param0, param1) = &descriptor.startup_params;
        info!(
            "Runtime: spawning '{}' ({:?} {} {} {})",
            instance_name, descriptor.module_path, descriptor.entry, param0, param1
        );

        let spawned = Command::new(&descriptor.module_path)
            .arg(&descriptor.entry)
            .arg(param0)
            .arg(param1)
            .env(ENV_CONTROL_PORT, control_port.to_string())
            .env(ENV_SEARCH_PATH, descriptor.search_paths.join(":"))
            .env(ENV_CONFIG_FILE, &descriptor.config_file)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            // Killing the host kills its instances.
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.ports.lock().unwrap().release(control_port);
                return Err(e).with_context(|| {
                    format!("Failed to spawn module {:?}", descriptor.module_path)
                });
            }
        };

        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                self.ports.lock().unwrap().release(control_port);
                anyhow::bail!("Module {:?} exited before it got a PID", descriptor.module_path);
            }
        };

        info!("Runtime: '{}' started (PID {})", instance_name, pid);
        self.children
            .lock()
            .unwrap()
            .insert(pid, ManagedChild { child, control_port });

        Ok(ContextHandle { pid, control_port })
    }

    async fn teardown(&self, handle: &ContextHandle) -> Result<(), TeardownRefused> {
        // Take ownership so no lock is held across the waits below.
        let managed = { self.children.lock().unwrap().remove(&handle.pid) };
        let mut managed = match managed {
            Some(m) => m,
            // Already reaped or never ours: nothing left to release.
            None => return Ok(()),
        };

        info!("Runtime: stopping PID {} (SIGTERM)", handle.pid);
        unsafe {
            libc::kill(handle.pid as i32, libc::SIGTERM);
        }
        if tokio::time::timeout(self.grace, managed.child.wait())
            .await
            .is_ok()
        {
            self.ports.lock().unwrap().release(managed.control_port);
            return Ok(());
        }

        warn!(
            "Runtime: PID {} ignored SIGTERM within {:?}, force killing",
            handle.pid, self.grace
        );
        let _ = managed.child.start_kill();
        if tokio::time::timeout(self.grace, managed.child.wait())
            .await
            .is_ok()
        {
            self.ports.lock().unwrap().release(managed.control_port);
            return Ok(());
        }

        // Survived SIGKILL within the bound: the context holds
        // non-releasable state. Put it back so it stays enumerable.
        error!("Runtime: PID {} refused teardown", handle.pid);
        self.children.lock().unwrap().insert(handle.pid, managed);
        Err(TeardownRefused)
    }

    async fn live_contexts(&self) -> Vec<u32> {
        let mut children = self.children.lock().unwrap();
        let mut exited = Vec::new();

        for (pid, managed) in children.iter_mut() {
            match managed.child.try_wait() {
                Ok(Some(status)) => {
                    warn!("Runtime: PID {} exited: {}", pid, status);
                    exited.push(*pid);
                }
                Ok(None) => {}
                Err(e) => error!("Runtime: wait error on PID {}: {}", pid, e),
            }
        }

        // Reap the dead and free their control ports.
        let mut ports = self.ports.lock().unwrap();
        for pid in exited {
            if let Some(managed) = children.remove(&pid) {
                ports.release(managed.control_port);
            }
        }

        children.keys().copied().collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn write_module(dir: &Path, name: &str, script: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn descriptor(module_path: PathBuf) -> Descriptor {
        Descriptor {
            service_class: "Sleeper".to_string(),
            module_path,
            entry: "start".to_string(),
            search_paths: vec!["/opt/deps".to_string()],
            startup_params: ("127.0.0.1".to_string(), "5800".to_string()),
            config_file: "sleeper.toml".to_string(),
        }
    }

    fn backend() -> ProcessBackend {
        ProcessBackend::new(16900, 16910, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn launch_then_teardown_releases_the_context() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(dir.path(), "sleeper.svc", "#!/bin/sh\nsleep 30\n");

        let backend = backend();
        let handle = backend
            .launch("Sleeper", &descriptor(module))
            .await
            .unwrap();

        assert!(backend.live_contexts().await.contains(&handle.pid));
        backend.teardown(&handle).await.unwrap();
        assert!(!backend.live_contexts().await.contains(&handle.pid));
    }

    #[tokio::test]
    async fn exited_context_disappears_from_live_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(dir.path(), "quitter.svc", "#!/bin/sh\nexit 0\n");

        let backend = backend();
        let handle = backend
            .launch("Quitter", &descriptor(module))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!backend.live_contexts().await.contains(&handle.pid));
    }

    #[tokio::test]
    async fn sigterm_resistant_context_still_goes_down() {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(
            dir.path(),
            "stubborn.svc",
            "#!/bin/sh\ntrap '' TERM\nsleep 30\n",
        );

        let backend = backend();
        let handle = backend
            .launch("Stubborn", &descriptor(module))
            .await
            .unwrap();

        // SIGTERM is trapped; the SIGKILL escalation must finish it.
        backend.teardown(&handle).await.unwrap();
        assert!(!backend.live_contexts().await.contains(&handle.pid));
    }

    #[tokio::test]
    async fn launch_failure_does_not_leak_ports() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.svc");

        // Range of exactly one port: a leak would exhaust it.
        let backend = ProcessBackend::new(16920, 16920, Duration::from_millis(200));
        for _ in 0..3 {
            assert!(backend
                .launch("Nope", &descriptor(missing.clone()))
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn teardown_of_unknown_handle_is_success() {
        let backend = backend();
        let handle = ContextHandle {
            pid: 999_999,
            control_port: 16905,
        };
        assert!(backend.teardown(&handle).await.is_ok());
    }
}
