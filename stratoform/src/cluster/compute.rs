//! Compute nodes: one availability grouping plus the control and worker
//! virtual machines.

use std::sync::Arc;

use tracing::{debug, info};

use stratoform_core::error::{StratoformError, StratoformResult};
use stratoform_core::output::Output;
use stratoform_core::provider::CloudProvider;
use stratoform_core::resources::{
    AvailabilitySet, AvailabilitySetArgs, BootDiagnosticsSpec, DiskCreateOption, ImageReference,
    NetworkInterface, OsDiskSpec, OsProfileSpec, VirtualMachine, VirtualMachineArgs,
};
use stratoform_core::types::{ClusterTopologySpec, NodeRole, ResourceId};

use crate::cluster::secrets::MachineConfigs;
use crate::network::NetworkPlan;

const OS_DISK_SIZE_GB: u32 = 10;
const FAULT_DOMAIN_COUNT: u32 = 2;

// Required by the VM API; password login is disabled in the image.
const PLACEHOLDER_ADMIN_USER: &str = "talos";
const PLACEHOLDER_ADMIN_PASSWORD: &str = "talosASD123&€#";

pub struct ComputeNode {
    pub name: String,
    pub role: NodeRole,
    pub machine: VirtualMachine,
}

pub struct ComputeResources {
    pub availability_set: AvailabilitySet,
    pub nodes: Vec<ComputeNode>,
}

pub struct ProvisionComputeParams<'a> {
    pub spec: &'a ClusterTopologySpec,
    pub network: &'a NetworkPlan,
    pub machine_configs: &'a MachineConfigs,
    /// Blob endpoint boot diagnostics are written to.
    pub storage_blob_endpoint: &'a Output<String>,
}

struct NodeSpec<'a> {
    role: NodeRole,
    index: u32,
    interface: &'a NetworkInterface,
    availability_set: &'a ResourceId,
    image: &'a ImageReference,
    boot_diagnostics_uri: &'a str,
}

pub struct ComputeProvisioner {
    provider: Arc<dyn CloudProvider>,
    resource_group: String,
}

impl ComputeProvisioner {
    pub fn new(provider: Arc<dyn CloudProvider>, resource_group: impl Into<String>) -> Self {
        Self {
            provider,
            resource_group: resource_group.into(),
        }
    }

    /// Create the availability grouping and every node.
    ///
    /// Interface counts must match the topology exactly; the NIC and
    /// availability-set identifiers are resolved before any node request
    /// is issued.
    pub async fn provision(
        &self,
        params: ProvisionComputeParams<'_>,
    ) -> StratoformResult<ComputeResources> {
        let spec = params.spec;
        let controls = params.network.control_interfaces.len();
        if controls != spec.control_count as usize {
            return Err(StratoformError::ContractViolation {
                message: format!(
                    "topology wants {} control interfaces, network plan has {controls}",
                    spec.control_count
                ),
            });
        }
        let workers = params.network.worker_interfaces.len();
        if workers != spec.worker_count as usize {
            return Err(StratoformError::ContractViolation {
                message: format!(
                    "topology wants {} worker interfaces, network plan has {workers}",
                    spec.worker_count
                ),
            });
        }

        let availability_set = self
            .provider
            .create_availability_set(
                "availabilitySet",
                AvailabilitySetArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    sku_name: "Aligned".to_string(),
                    platform_fault_domain_count: FAULT_DOMAIN_COUNT,
                },
            )
            .await?;
        let availability_set_id = availability_set.id.resolve().await?;
        let boot_diagnostics_uri = params.storage_blob_endpoint.resolve().await?;
        let image = ImageReference::community_gallery(&spec.architecture, &spec.talos_version);

        let mut nodes = Vec::with_capacity(controls + workers);
        for (i, control) in params.network.control_interfaces.iter().enumerate() {
            nodes.push(
                self.create_node(
                    spec,
                    params.machine_configs,
                    NodeSpec {
                        role: NodeRole::Controlplane,
                        index: i as u32,
                        interface: &control.interface,
                        availability_set: &availability_set_id,
                        image: &image,
                        boot_diagnostics_uri: &boot_diagnostics_uri,
                    },
                )
                .await?,
            );
        }
        for (i, interface) in params.network.worker_interfaces.iter().enumerate() {
            nodes.push(
                self.create_node(
                    spec,
                    params.machine_configs,
                    NodeSpec {
                        role: NodeRole::Worker,
                        index: i as u32,
                        interface,
                        availability_set: &availability_set_id,
                        image: &image,
                        boot_diagnostics_uri: &boot_diagnostics_uri,
                    },
                )
                .await?,
            );
        }

        info!(nodes = nodes.len(), "compute nodes created");
        Ok(ComputeResources {
            availability_set,
            nodes,
        })
    }

    /// One node, any role. Role decides the name, the interface, and the
    /// bootstrap document; everything else is shared.
    async fn create_node(
        &self,
        spec: &ClusterTopologySpec,
        configs: &MachineConfigs,
        node: NodeSpec<'_>,
    ) -> StratoformResult<ComputeNode> {
        let name = node.role.node_name(node.index);
        let interface_id = node.interface.id.resolve().await?;
        let configuration = configs.for_role(node.role);
        debug!(node = %name, role = %node.role, "creating compute node");
        let machine = self
            .provider
            .create_virtual_machine(
                &name,
                VirtualMachineArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    vm_size: spec.vm_size.clone(),
                    image: node.image.clone(),
                    os_disk: OsDiskSpec {
                        size_gb: OS_DISK_SIZE_GB,
                        create_option: DiskCreateOption::FromImage,
                    },
                    os_profile: OsProfileSpec {
                        computer_name: name.clone(),
                        custom_data: configuration.custom_data(),
                        admin_username: PLACEHOLDER_ADMIN_USER.to_string(),
                        admin_password: PLACEHOLDER_ADMIN_PASSWORD.to_string(),
                    },
                    boot_diagnostics: BootDiagnosticsSpec {
                        enabled: true,
                        storage_uri: node.boot_diagnostics_uri.to_string(),
                    },
                    network_interface: interface_id,
                    availability_set: node.availability_set.clone(),
                },
            )
            .await?;
        Ok(ComputeNode {
            name,
            role: node.role,
            machine,
        })
    }
}
