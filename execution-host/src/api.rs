//! Operation adapters: the thin layer translating inbound protocol
//! commands into supervisor calls. No lifecycle logic lives here.

use crate::runtime::IsolationBackend;
use crate::supervisor::Supervisor;
use anyhow::Result;
use host_protocol::{HostCommand, HostResponse, HostServer, TransportDuplex};
use log::{error, info};
use std::sync::Arc;

pub struct ApiServer<B: IsolationBackend> {
    server: HostServer,
    supervisor: Arc<Supervisor<B>>,
}

impl<B: IsolationBackend> ApiServer<B> {
    pub fn new(transport: Box<dyn TransportDuplex>, supervisor: Arc<Supervisor<B>>) -> Self {
        Self {
            server: HostServer::new(transport),
            supervisor,
        }
    }

    /// Serves commands until a Shutdown arrives. All instances are
    /// stopped before the Shutdown acknowledgment goes out.
    pub async fn run(&mut self) -> Result<()> {
        info!("API Server: listening for commands...");
        loop {
            match self.server.next_command().await {
                Ok(cmd) => {
                    info!("API Server: received command: {:?}", cmd);
                    let is_shutdown = matches!(cmd, HostCommand::Shutdown);
                    let response = self.handle_command(cmd).await;
                    if let Err(e) = self.server.send_response(response).await {
                        error!("API Server: failed to send response: {}", e);
                    }
                    if is_shutdown {
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!("API Server: transport error: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_command(&self, cmd: HostCommand) -> HostResponse {
        match cmd {
            HostCommand::StartService { service_class } => {
                match self.supervisor.start(&service_class).await {
                    Ok(message) => HostResponse::StartAck {
                        started: true,
                        message,
                    },
                    // Every failed start looks the same to the caller:
                    // not started, empty message, no state change.
                    Err(_) => HostResponse::StartAck {
                        started: false,
                        message: String::new(),
                    },
                }
            }
            HostCommand::StopInstance { instance } => HostResponse::StopAck {
                stopped: self.supervisor.stop(&instance).await.is_ok(),
            },
            HostCommand::QueryService => HostResponse::Services {
                available: self.supervisor.list_available(),
                running: self.supervisor.list_running().await,
            },
            HostCommand::ExecInstance { target, payload } => {
                match self.supervisor.exec(&target, &payload).await {
                    Ok(payload) => HostResponse::ExecReply { payload },
                    Err(e) => HostResponse::Error(format!("{:#}", e)),
                }
            }
            HostCommand::Shutdown => {
                self.supervisor.shutdown_all().await;
                HostResponse::Success("Shutdown complete".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCatalog;
    use crate::runtime::{ContextHandle, TeardownRefused};
    use async_trait::async_trait;
    use host_protocol::transport::MemoryDuplex;
    use host_protocol::{Descriptor, HostClient};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBackend {
        next_pid: AtomicU32,
        live: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl IsolationBackend for MockBackend {
        async fn launch(&self, _name: &str, _d: &Descriptor) -> anyhow::Result<ContextHandle> {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst) + 1;
            self.live.lock().unwrap().push(pid);
            Ok(ContextHandle {
                pid,
                control_port: 0,
            })
        }

        async fn teardown(&self, handle: &ContextHandle) -> Result<(), TeardownRefused> {
            self.live.lock().unwrap().retain(|p| *p != handle.pid);
            Ok(())
        }

        async fn live_contexts(&self) -> Vec<u32> {
            self.live.lock().unwrap().clone()
        }
    }

    fn wired_server() -> (HostClient, tokio::task::JoinHandle<()>) {
        let catalog = ServiceCatalog::build(vec![Descriptor {
            service_class: "Foo".to_string(),
            module_path: PathBuf::from("foo.svc"),
            entry: "start".to_string(),
            search_paths: vec![],
            startup_params: ("127.0.0.1".to_string(), "5800".to_string()),
            config_file: String::new(),
        }]);
        let supervisor = Arc::new(Supervisor::new(catalog, Arc::new(MockBackend::default())));

        let (client_side, server_side) = MemoryDuplex::pair();
        let mut api = ApiServer::new(Box::new(server_side), supervisor);
        let handle = tokio::spawn(async move {
            api.run().await.unwrap();
        });
        (HostClient::new(Box::new(client_side)), handle)
    }

    #[tokio::test]
    async fn adapter_maps_lifecycle_results_onto_the_wire() {
        let (mut client, server_task) = wired_server();

        // Unregistered class: (false, "").
        match client
            .send_command(HostCommand::StartService {
                service_class: "Bar".into(),
            })
            .await
            .unwrap()
        {
            HostResponse::StartAck { started, message } => {
                assert!(!started);
                assert!(message.is_empty());
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        // Registered class: (true, class name).
        match client
            .send_command(HostCommand::StartService {
                service_class: "Foo".into(),
            })
            .await
            .unwrap()
        {
            HostResponse::StartAck { started, message } => {
                assert!(started);
                assert_eq!(message, "Foo");
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        match client.send_command(HostCommand::QueryService).await.unwrap() {
            HostResponse::Services { available, running } => {
                assert_eq!(available, vec!["Foo"]);
                assert_eq!(running.len(), 1);
                assert_eq!(running[0].name, "Foo");
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        match client
            .send_command(HostCommand::StopInstance {
                instance: "Foo".into(),
            })
            .await
            .unwrap()
        {
            HostResponse::StopAck { stopped } => assert!(stopped),
            other => panic!("Unexpected response: {:?}", other),
        }

        // Shutdown acknowledges and ends the serve loop.
        match client.send_command(HostCommand::Shutdown).await.unwrap() {
            HostResponse::Success(_) => {}
            other => panic!("Unexpected response: {:?}", other),
        }
        server_task.await.unwrap();
    }
}
