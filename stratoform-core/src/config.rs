//! Topology configuration loading.
//!
//! The configuration surface is read once at process start from a TOML
//! file with two tables, `[azure]` and `[cluster]`. Every key is
//! required; a missing key is a fatal configuration error raised before
//! any resource creation begins.

use std::path::Path;

use serde::Deserialize;

use crate::error::{StratoformError, StratoformResult};
use crate::types::ClusterTopologySpec;

#[derive(Debug, Deserialize)]
struct RawConfig {
    azure: Option<AzureSection>,
    cluster: Option<ClusterSection>,
}

#[derive(Debug, Deserialize)]
struct AzureSection {
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterSection {
    name: Option<String>,
    controls: Option<u32>,
    workers: Option<u32>,
    architecture: Option<String>,
    #[serde(rename = "talos-version")]
    talos_version: Option<String>,
    vm: Option<String>,
}

/// Read and validate the topology from a configuration file.
pub fn load_topology(path: &Path) -> StratoformResult<ClusterTopologySpec> {
    let text = std::fs::read_to_string(path).map_err(|e| StratoformError::Configuration {
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    parse_topology(&text)
}

/// Parse and validate topology configuration text.
pub fn parse_topology(text: &str) -> StratoformResult<ClusterTopologySpec> {
    let raw: RawConfig = toml::from_str(text).map_err(|e| StratoformError::Configuration {
        message: format!("malformed configuration: {e}"),
    })?;

    let azure = raw
        .azure
        .ok_or_else(|| missing("azure", "top level"))?;
    let cluster = raw
        .cluster
        .ok_or_else(|| missing("cluster", "top level"))?;

    Ok(ClusterTopologySpec {
        region: require(azure.location, "azure", "location")?,
        cluster_name: require(cluster.name, "cluster", "name")?,
        control_count: require(cluster.controls, "cluster", "controls")?,
        worker_count: require(cluster.workers, "cluster", "workers")?,
        architecture: require(cluster.architecture, "cluster", "architecture")?,
        talos_version: require(cluster.talos_version, "cluster", "talos-version")?,
        vm_size: require(cluster.vm, "cluster", "vm")?,
    })
}

fn require<T>(value: Option<T>, table: &str, key: &str) -> StratoformResult<T> {
    value.ok_or_else(|| missing(table, key))
}

fn missing(table: &str, key: &str) -> StratoformError {
    StratoformError::Configuration {
        message: format!("{table} {key} configuration not set"),
    }
}
