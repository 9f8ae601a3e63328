//! Bootstrap discovery of service modules.
//!
//! The scan runs once, at host startup. Every candidate file in the
//! module directory is probed by executing it with the well-known
//! `manifest` argument in a throwaway child process and parsing the
//! JSON it prints. Module code therefore never loads into the host's
//! own execution context; a misbehaving candidate can only take down
//! its probe process.
//!
//! Per-candidate failures are absorbed: a module that cannot be
//! executed, answers with garbage, or declares an unusable manifest
//! simply contributes no descriptor. The only fatal condition is a
//! module directory that cannot be enumerated at all.

use anyhow::{Context, Result};
use host_protocol::{Descriptor, ServiceManifest};
use log::{debug, info};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// A module that never answers the probe must not stall host startup.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Scans `dir` for candidate modules (regular files carrying `suffix`)
/// and returns a descriptor for every conforming one. `startup_params`
/// are baked into each descriptor, fixed for the catalog's lifetime.
pub async fn scan(
    dir: &Path,
    suffix: &str,
    startup_params: &(String, String),
) -> Result<Vec<Descriptor>> {
    info!("Scanner: scanning {:?} for '*{}' modules", dir, suffix);

    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to enumerate module directory {:?}", dir))?;

    let mut descriptors = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .context("Failed to read module directory entry")?
    {
        let path = entry.path();
        if !path.is_file() || !is_candidate(&path, suffix) {
            continue;
        }
        if let Some(descriptor) = probe_module(&path, startup_params).await {
            info!(
                "Scanner: discovered service '{}' in {:?}",
                descriptor.service_class,
                path.file_name()
            );
            descriptors.push(descriptor);
        }
    }

    info!("Scanner: discovery finished, {} service(s)", descriptors.len());
    Ok(descriptors)
}

fn is_candidate(path: &Path, suffix: &str) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('.') && name.ends_with(suffix),
        None => false,
    }
}

/// Runs `<module> manifest` and maps the answer to a descriptor.
/// Returns None for every kind of per-module failure.
async fn probe_module(path: &Path, startup_params: &(String, String)) -> Option<Descriptor> {
    let probe = Command::new(path)
        .arg("manifest")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("Scanner: could not execute {:?}: {}", path, e);
            return None;
        }
        Err(_) => {
            debug!("Scanner: probe of {:?} timed out", path);
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "Scanner: {:?} did not answer the manifest probe ({})",
            path, output.status
        );
        return None;
    }

    let json = match String::from_utf8(output.stdout) {
        Ok(json) => json,
        Err(_) => {
            debug!("Scanner: {:?} printed non-UTF8 manifest output", path);
            return None;
        }
    };

    let manifest: ServiceManifest = match serde_json::from_str(json.trim()) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!("Scanner: {:?} printed an invalid manifest: {}", path, e);
            return None;
        }
    };

    // A manifest without a class name or entry point is not startable.
    if manifest.service_class.is_empty() || manifest.entry.is_empty() {
        debug!("Scanner: {:?} declared an unusable manifest", path);
        return None;
    }

    Some(Descriptor::from_manifest(
        &manifest,
        path.to_path_buf(),
        startup_params.clone(),
    ))
}
