//! Request arguments and handles for the cloud provider surface.
//!
//! Every create call takes a request-time name plus a typed args struct
//! and returns a handle carrying that name and the resource's computed
//! attributes as [`Output`] values. Args embed only *resolved*
//! identifiers ([`ResourceId`]), which is what forces callers to await an
//! upstream attribute before a dependent request can even be constructed.

use crate::output::Output;
use crate::types::ResourceId;

/// Community gallery the OS images are published under.
const SIDEROLABS_GALLERY: &str = "siderolabs-c4d707c0-343e-42de-b597-276e4f7a5b0b";

// ---------------------------------------------------------------------------
// Resource group and storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupArgs {
    pub location: String,
}

#[derive(Clone)]
pub struct ResourceGroup {
    pub name: String,
    pub id: Output<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccountArgs {
    pub resource_group: String,
    pub location: String,
    pub sku_name: String,
    pub kind: String,
}

#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    pub id: Output<ResourceId>,
    /// Blob endpoint URI, consumed by VM boot diagnostics.
    pub primary_blob_endpoint: Output<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccountKey {
    pub key_name: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub address_prefix: String,
    /// Egress path; subnet creation therefore awaits the gateway.
    pub nat_gateway: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNetworkArgs {
    pub resource_group: String,
    pub location: String,
    pub address_space: Vec<String>,
    pub flow_timeout_minutes: u32,
    pub subnet: SubnetSpec,
}

#[derive(Clone)]
pub struct VirtualNetwork {
    pub name: String,
    pub id: Output<ResourceId>,
    pub subnet_id: Output<ResourceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAccess {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleProtocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRuleSpec {
    pub name: String,
    pub priority: u32,
    pub direction: RuleDirection,
    pub access: RuleAccess,
    pub protocol: RuleProtocol,
    pub source_port_range: String,
    pub destination_port_range: String,
    pub source_address_prefix: String,
    pub destination_address_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSecurityGroupArgs {
    pub resource_group: String,
    pub location: String,
    /// Fixed rule set, in creation order.
    pub security_rules: Vec<SecurityRuleSpec>,
}

#[derive(Clone)]
pub struct NetworkSecurityGroup {
    pub name: String,
    pub id: Output<ResourceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAllocationMethod {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicIpSku {
    Basic,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpArgs {
    pub resource_group: String,
    pub location: String,
    pub allocation_method: IpAllocationMethod,
    pub sku: Option<PublicIpSku>,
}

#[derive(Debug, Clone)]
pub struct PublicIp {
    pub name: String,
    pub id: Output<ResourceId>,
    pub ip_address: Output<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatGatewayArgs {
    pub resource_group: String,
    pub location: String,
    pub public_ip: ResourceId,
}

#[derive(Clone)]
pub struct NatGateway {
    pub name: String,
    pub id: Output<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendSpec {
    pub name: String,
    pub public_ip: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPoolSpec {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub name: String,
    pub port: u16,
    pub protocol: RuleProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerArgs {
    pub resource_group: String,
    pub location: String,
    pub frontend: FrontendSpec,
    pub backend_pool: BackendPoolSpec,
    pub probe: ProbeSpec,
}

#[derive(Clone)]
pub struct LoadBalancer {
    pub name: String,
    pub id: Output<ResourceId>,
    pub frontend_id: Output<ResourceId>,
    pub backend_pool_id: Output<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNatRuleArgs {
    pub resource_group: String,
    pub load_balancer: String,
    pub frontend: ResourceId,
    pub backend_pool: ResourceId,
    pub protocol: RuleProtocol,
    pub frontend_port_start: u16,
    pub frontend_port_end: u16,
    pub backend_port: u16,
}

#[derive(Clone)]
pub struct InboundNatRule {
    pub name: String,
    pub id: Output<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfigurationSpec {
    pub name: String,
    pub subnet: ResourceId,
    /// Dedicated public address; control-plane interfaces only.
    pub public_ip: Option<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterfaceArgs {
    pub resource_group: String,
    pub location: String,
    pub network_security_group: ResourceId,
    pub ip_configuration: IpConfigurationSpec,
    /// Load-balancer pool membership; worker interfaces only.
    pub backend_pool: Option<ResourceId>,
}

#[derive(Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub id: Output<ResourceId>,
    pub private_ip: Output<String>,
}

// ---------------------------------------------------------------------------
// Compute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySetArgs {
    pub resource_group: String,
    pub location: String,
    pub sku_name: String,
    pub platform_fault_domain_count: u32,
}

#[derive(Clone)]
pub struct AvailabilitySet {
    pub name: String,
    pub id: Output<ResourceId>,
}

/// Image to boot nodes from, resolved against the fixed community
/// gallery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub community_gallery_image_id: String,
}

impl ImageReference {
    pub fn community_gallery(architecture: &str, version: &str) -> Self {
        Self {
            community_gallery_image_id: format!(
                "/CommunityGalleries/{SIDEROLABS_GALLERY}/Images/{architecture}/Versions/{version}"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCreateOption {
    FromImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsDiskSpec {
    pub size_gb: u32,
    pub create_option: DiskCreateOption,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsProfileSpec {
    pub computer_name: String,
    /// Base64-encoded bootstrap document the node consumes at first boot.
    pub custom_data: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootDiagnosticsSpec {
    pub enabled: bool,
    pub storage_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachineArgs {
    pub resource_group: String,
    pub location: String,
    pub vm_size: String,
    pub image: ImageReference,
    pub os_disk: OsDiskSpec,
    pub os_profile: OsProfileSpec,
    pub boot_diagnostics: BootDiagnosticsSpec,
    pub network_interface: ResourceId,
    pub availability_set: ResourceId,
}

#[derive(Clone)]
pub struct VirtualMachine {
    pub name: String,
    pub id: Output<ResourceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn community_gallery_path_carries_architecture_and_version() {
        let image = ImageReference::community_gallery("talos-x64", "1.7.6");
        assert_eq!(
            image.community_gallery_image_id,
            "/CommunityGalleries/siderolabs-c4d707c0-343e-42de-b597-276e4f7a5b0b\
             /Images/talos-x64/Versions/1.7.6"
        );
    }
}
