//! Domain types shared across the provisioning components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP port the cluster API listens on; also the load balancer probe and
/// forwarding port.
pub const API_PORT: u16 = 6443;

/// The declarative topology a run provisions. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopologySpec {
    /// Cloud region every resource is placed in.
    pub region: String,
    /// Cluster name, also used for secret and configuration derivation.
    pub cluster_name: String,
    /// Number of control-plane nodes.
    pub control_count: u32,
    /// Number of worker nodes.
    pub worker_count: u32,
    /// Image architecture identifier in the community gallery.
    pub architecture: String,
    /// OS image version tag.
    pub talos_version: String,
    /// VM size class for every node.
    pub vm_size: String,
}

/// Role a node assumes when it joins the cluster.
///
/// Closed two-variant union; everything role-specific (dedicated public
/// IP, backend-pool membership, bootstrap document) is parameterized on
/// it rather than duplicated per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Controlplane,
    Worker,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Controlplane => "controlplane",
            NodeRole::Worker => "worker",
        }
    }

    /// Node name for the given index: `control-<i>` or `worker-<i>`.
    pub fn node_name(&self, index: u32) -> String {
        match self {
            NodeRole::Controlplane => format!("control-{index}"),
            NodeRole::Worker => format!("worker-{index}"),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-assigned identifier of a materialized resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_names_follow_role_and_index() {
        assert_eq!(NodeRole::Controlplane.node_name(0), "control-0");
        assert_eq!(NodeRole::Worker.node_name(4), "worker-4");
    }

    #[test]
    fn role_tags_match_bootstrap_vocabulary() {
        assert_eq!(NodeRole::Controlplane.to_string(), "controlplane");
        assert_eq!(NodeRole::Worker.to_string(), "worker");
    }
}
