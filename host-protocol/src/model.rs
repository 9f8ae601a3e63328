use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Self-description a module prints (as JSON) when probed with the
/// `manifest` argument. This is the conformance contract: a file that
/// does not answer the probe with a valid manifest is not a service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceManifest {
    /// Unique identifier for the service class (e.g. "LoginService").
    pub service_class: String,

    /// Subcommand the host invokes to start the service (e.g. "start").
    pub entry: String,

    /// Extra directories the spawned instance should resolve
    /// dependencies from.
    #[serde(default)]
    pub search_paths: Vec<String>,

    /// Name of the configuration resource the instance should load.
    #[serde(default)]
    pub config_file: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,
}

impl ServiceManifest {
    /// Parses the JSON a module prints in answer to the `manifest`
    /// probe.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Immutable record describing how to locate and start one discovered
/// service implementation. Produced by the scanner, never mutated.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Descriptor {
    /// Catalog key, taken from the module's manifest.
    pub service_class: String,

    /// Path to the module file providing the implementation.
    pub module_path: PathBuf,

    /// Entry subcommand declared by the manifest.
    pub entry: String,

    /// Dependency search path handed to the spawned instance.
    pub search_paths: Vec<String>,

    /// The two startup parameters every entry point receives,
    /// fixed at discovery time.
    pub startup_params: (String, String),

    /// Configuration resource name handed to the spawned instance.
    pub config_file: String,
}

impl Descriptor {
    /// Builds a descriptor from a probed manifest. The startup
    /// parameters are the host's own, baked in for the lifetime of the
    /// catalog.
    pub fn from_manifest(
        manifest: &ServiceManifest,
        module_path: PathBuf,
        startup_params: (String, String),
    ) -> Self {
        Self {
            service_class: manifest.service_class.clone(),
            module_path,
            entry: manifest.entry.clone(),
            search_paths: manifest.search_paths.clone(),
            startup_params,
            config_file: manifest.config_file.clone(),
        }
    }
}

/// Public view of one running instance, detached from any live handle.
/// Used in query responses.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InstanceInfo {
    /// Unique instance name, possibly disambiguated ("Foo", "Foo[1]").
    pub name: String,
    pub service_class: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}
