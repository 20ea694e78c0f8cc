//! Dependency-ordered provisioning for a small immutable-OS Kubernetes
//! cluster: network topology, cluster secrets and bootstrap
//! configuration, compute nodes, and the orchestration that wires them
//! together.

pub mod cluster;
pub mod network;
pub mod orchestrator;

pub use cluster::compute::{ComputeProvisioner, ComputeResources};
pub use cluster::secrets::{MachineConfigs, SecretsAndConfigChain};
pub use network::{NetworkPlan, NetworkTopologyBuilder, RulePrioritySequence};
pub use orchestrator::{Orchestrator, StackOutputs};

// Re-export core types for convenience
pub use stratoform_core::{
    error::{StratoformError, StratoformResult},
    types::{ClusterTopologySpec, NodeRole},
};
