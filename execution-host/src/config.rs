use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One entry of the declared-service list read at startup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeclaredService {
    pub service_class: String,
    #[serde(default)]
    pub auto_start: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HostConfig {
    /// Address the command interface binds to.
    pub listen_addr: String,
    pub listen_port: u16,

    /// Directory scanned for service modules at startup.
    pub module_dir: String,

    /// Fixed filename suffix a candidate module must carry.
    pub module_suffix: String,

    /// Range the per-instance control ports are allocated from.
    pub control_port_start: u16,
    pub control_port_end: u16,

    /// How long a stopping instance gets to exit after SIGTERM (and
    /// again after SIGKILL) before teardown counts as refused.
    pub stop_grace_ms: u64,

    /// Declared services with their auto-start flags.
    pub services: Vec<DeclaredService>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 5800,
            module_dir: ".".to_string(),
            module_suffix: ".svc".to_string(),
            control_port_start: 5900,
            control_port_end: 5999,
            stop_grace_ms: 500,
            services: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Loads the configuration: defaults layered under an optional
    /// `host.toml` in the working directory.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&HostConfig::default())?)
            .add_source(config::File::with_name("host").required(false))
            .build()
            .context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// The two startup parameters handed to every entry point, fixed at
    /// discovery time: the host's own address and port, as plain
    /// strings.
    pub fn startup_params(&self) -> (String, String) {
        (self.listen_addr.clone(), self.listen_port.to_string())
    }

    pub fn listen_endpoint(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}
