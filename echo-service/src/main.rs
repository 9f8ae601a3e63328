//! A minimal conforming service module for manual end-to-end testing.
//!
//! Rename the built binary so it matches the host's module pattern
//! (e.g. `echo.svc`), drop it into the module directory, and the
//! scanner will pick it up. A started instance serves its control port
//! by echoing every exec payload back.

use anyhow::{Context, Result};
use host_protocol::transport::{TcpServerDuplex, TransportDuplex};
use host_protocol::ServiceManifest;
use log::info;

fn manifest() -> ServiceManifest {
    ServiceManifest {
        service_class: "EchoService".to_string(),
        entry: "start".to_string(),
        search_paths: vec![],
        config_file: String::new(),
        version: "0.1.0".to_string(),
        description: "Echoes exec payloads back to the host".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("manifest") => {
            println!("{}", manifest().to_json()?);
            Ok(())
        }
        Some("start") => {
            let host_addr = args.get(2).cloned().unwrap_or_default();
            let host_port = args.get(3).cloned().unwrap_or_default();
            run(&host_addr, &host_port).await
        }
        other => {
            anyhow::bail!("Unknown invocation: {:?}", other);
        }
    }
}

async fn run(host_addr: &str, host_port: &str) -> Result<()> {
    let control_port = std::env::var("EXEC_HOST_CONTROL_PORT")
        .context("EXEC_HOST_CONTROL_PORT is not set; not started by an execution host?")?;
    info!(
        "EchoService: started by host {}:{}, control port {}",
        host_addr, host_port, control_port
    );

    let mut transport = TcpServerDuplex::bind(&format!("127.0.0.1:{}", control_port)).await?;
    loop {
        let payload = transport.recv_bytes().await?;
        info!("EchoService: echoing {} byte(s)", payload.len());
        transport.send_bytes(&payload).await?;
    }
}
