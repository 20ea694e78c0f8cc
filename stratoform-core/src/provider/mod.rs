//! External collaborator seams.
//!
//! The provisioning engine and the cluster bootstrap machinery are not
//! part of this repository; the core only ever talks to them through the
//! traits below. Both are idempotent by name: issuing the same request
//! twice converges on one resource.

pub mod simulated;

use async_trait::async_trait;

use crate::error::StratoformResult;
use crate::machine::{ClusterClientConfig, MachineConfiguration, MachineSecrets};
use crate::resources::{
    AvailabilitySet, AvailabilitySetArgs, InboundNatRule, InboundNatRuleArgs, LoadBalancer,
    LoadBalancerArgs, NatGateway, NatGatewayArgs, NetworkInterface, NetworkInterfaceArgs,
    NetworkSecurityGroup, NetworkSecurityGroupArgs, PublicIp, PublicIpArgs, ResourceGroup,
    ResourceGroupArgs, StorageAccount, StorageAccountArgs, StorageAccountKey, VirtualMachine,
    VirtualMachineArgs, VirtualNetwork, VirtualNetworkArgs,
};
use crate::types::NodeRole;

/// Idempotent create-or-update-by-name surface of the cloud provisioning
/// engine.
///
/// Each call registers desired state and returns a handle whose computed
/// attributes resolve once the engine has materialized the resource. A
/// rejected request surfaces as a provider error carrying the resource
/// identity and operation; retry, backoff, and reconciliation are the
/// engine's concern, never the caller's.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn create_resource_group(
        &self,
        name: &str,
        args: ResourceGroupArgs,
    ) -> StratoformResult<ResourceGroup>;

    async fn create_storage_account(
        &self,
        name: &str,
        args: StorageAccountArgs,
    ) -> StratoformResult<StorageAccount>;

    /// List the account's access keys. Requires the account to exist.
    async fn storage_account_keys(
        &self,
        resource_group: &str,
        account: &str,
    ) -> StratoformResult<Vec<StorageAccountKey>>;

    async fn create_virtual_network(
        &self,
        name: &str,
        args: VirtualNetworkArgs,
    ) -> StratoformResult<VirtualNetwork>;

    async fn create_network_security_group(
        &self,
        name: &str,
        args: NetworkSecurityGroupArgs,
    ) -> StratoformResult<NetworkSecurityGroup>;

    async fn create_public_ip(&self, name: &str, args: PublicIpArgs)
        -> StratoformResult<PublicIp>;

    async fn create_nat_gateway(
        &self,
        name: &str,
        args: NatGatewayArgs,
    ) -> StratoformResult<NatGateway>;

    async fn create_load_balancer(
        &self,
        name: &str,
        args: LoadBalancerArgs,
    ) -> StratoformResult<LoadBalancer>;

    async fn create_inbound_nat_rule(
        &self,
        name: &str,
        args: InboundNatRuleArgs,
    ) -> StratoformResult<InboundNatRule>;

    async fn create_network_interface(
        &self,
        name: &str,
        args: NetworkInterfaceArgs,
    ) -> StratoformResult<NetworkInterface>;

    async fn create_availability_set(
        &self,
        name: &str,
        args: AvailabilitySetArgs,
    ) -> StratoformResult<AvailabilitySet>;

    async fn create_virtual_machine(
        &self,
        name: &str,
        args: VirtualMachineArgs,
    ) -> StratoformResult<VirtualMachine>;
}

/// Cluster bootstrap collaborator: secret generation and configuration
/// derivation. Cryptographic internals live behind this seam.
#[async_trait]
pub trait BootstrapProvider: Send + Sync {
    /// Generate fresh cluster-wide secret material.
    async fn generate_secrets(&self, cluster_name: &str) -> StratoformResult<MachineSecrets>;

    /// Derive the administrator client configuration for the given
    /// reachable node addresses.
    async fn client_configuration(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        nodes: Vec<String>,
    ) -> StratoformResult<ClusterClientConfig>;

    /// Derive the bootstrap document for one role against the cluster
    /// API endpoint.
    async fn machine_configuration(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        endpoint: &str,
        role: NodeRole,
    ) -> StratoformResult<MachineConfiguration>;
}
