mod api;
mod autostart;
mod catalog;
mod config;
mod error;
mod registry;
mod runtime;
mod scanner;
mod supervisor;

use anyhow::Result;
use api::ApiServer;
use catalog::ServiceCatalog;
use config::HostConfig;
use host_protocol::TcpServerDuplex;
use log::{error, info};
use runtime::traits::IsolationBackend;
use runtime::ProcessBackend;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Execution Host starting ===");

    let config = HostConfig::load()?;

    // 1. Discovery: one pass, before anything else comes up. An
    // unreadable module directory is the one fatal startup condition.
    let descriptors = scanner::scan(
        Path::new(&config.module_dir),
        &config.module_suffix,
        &config.startup_params(),
    )
    .await?;
    let catalog = ServiceCatalog::build(descriptors);
    info!("Catalog built: {} service class(es)", catalog.len());

    // 2. Runtime and supervisor.
    let backend = Arc::new(ProcessBackend::new(
        config.control_port_start,
        config.control_port_end,
        Duration::from_millis(config.stop_grace_ms),
    ));
    let supervisor = Arc::new(Supervisor::new(catalog, backend.clone()));

    // 3. Auto-start the declared services, without blocking startup.
    autostart::schedule(&supervisor, &config.services);

    // 4. Reap exited instances in the background.
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            backend.live_contexts().await;
        }
    });

    // 5. Command interface.
    let endpoint = config.listen_endpoint();
    info!("Binding command interface to {}", endpoint);
    let transport = TcpServerDuplex::bind(&endpoint).await?;
    let mut server = ApiServer::new(Box::new(transport), supervisor.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Command server failed: {:#}", e);
            }
            // A Shutdown command already drained the registry.
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down all instances");
            supervisor.shutdown_all().await;
        }
    }

    info!("=== Execution Host stopped ===");
    Ok(())
}
