//! Network topology for the cluster: virtual network, egress path,
//! ingress load balancer, and per-node interfaces.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use stratoform_core::error::StratoformResult;
use stratoform_core::provider::CloudProvider;
use stratoform_core::resources::{
    BackendPoolSpec, FrontendSpec, InboundNatRule, InboundNatRuleArgs, IpAllocationMethod,
    IpConfigurationSpec, LoadBalancer, LoadBalancerArgs, NatGateway, NatGatewayArgs,
    NetworkInterface, NetworkInterfaceArgs, NetworkSecurityGroup, NetworkSecurityGroupArgs,
    ProbeSpec, PublicIp, PublicIpArgs, PublicIpSku, RuleAccess, RuleDirection, RuleProtocol,
    SecurityRuleSpec, SubnetSpec, VirtualNetwork, VirtualNetworkArgs,
};
use stratoform_core::types::{ClusterTopologySpec, API_PORT};

const VNET_ADDRESS_SPACE: &str = "10.0.0.0/16";
const SUBNET_PREFIX: &str = "10.0.0.0/24";

/// Inbound ports the cluster needs open, in creation order.
const CLUSTER_INGRESS_PORTS: [(&str, &str); 4] = [
    ("apid", "50000"),
    ("trustd", "50001"),
    ("etcd", "2379-2380"),
    ("kube", "6443"),
];

/// Strictly increasing security-rule priority sequence.
///
/// Owned by the caller and handed to each builder invocation, so values
/// are never reused within a process even across multiple builds.
/// Assignment is deterministic for a fixed call order; the first value is
/// one above the floor.
pub struct RulePrioritySequence {
    counter: AtomicU32,
}

impl RulePrioritySequence {
    pub fn new() -> Self {
        Self::starting_above(1000)
    }

    pub fn starting_above(floor: u32) -> Self {
        Self {
            counter: AtomicU32::new(floor + 1),
        }
    }

    pub fn next(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for RulePrioritySequence {
    fn default() -> Self {
        Self::new()
    }
}

/// A control-plane interface with its dedicated public address.
pub struct ControlInterface {
    pub interface: NetworkInterface,
    pub public_ip: PublicIp,
}

/// Everything the network build produced, read-only thereafter.
pub struct NetworkPlan {
    pub virtual_network: VirtualNetwork,
    pub network_security_group: NetworkSecurityGroup,
    pub egress_ip: PublicIp,
    pub nat_gateway: NatGateway,
    pub ingress_ip: PublicIp,
    pub load_balancer: LoadBalancer,
    pub inbound_nat_rule: InboundNatRule,
    pub control_interfaces: Vec<ControlInterface>,
    pub worker_interfaces: Vec<NetworkInterface>,
}

pub struct NetworkTopologyBuilder<'a> {
    provider: Arc<dyn CloudProvider>,
    resource_group: String,
    priorities: &'a RulePrioritySequence,
}

impl<'a> NetworkTopologyBuilder<'a> {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        resource_group: impl Into<String>,
        priorities: &'a RulePrioritySequence,
    ) -> Self {
        Self {
            provider,
            resource_group: resource_group.into(),
            priorities,
        }
    }

    /// Build the network topology in data-dependency order.
    ///
    /// A provider failure aborts the remaining steps of the branch it
    /// occurred in; resources already created stay as they are.
    pub async fn build(&self, spec: &ClusterTopologySpec) -> StratoformResult<NetworkPlan> {
        // Egress path first: the subnet references the NAT gateway, and
        // the gateway references its public address.
        let egress_ip = self
            .provider
            .create_public_ip("nat-egress-ip", self.public_ip_args(spec, None))
            .await?;
        let nat_gateway = self
            .provider
            .create_nat_gateway(
                "nat-gateway",
                NatGatewayArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    public_ip: egress_ip.id.resolve().await?,
                },
            )
            .await?;

        let virtual_network = self
            .provider
            .create_virtual_network(
                "vnet",
                VirtualNetworkArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    address_space: vec![VNET_ADDRESS_SPACE.to_string()],
                    flow_timeout_minutes: 10,
                    subnet: SubnetSpec {
                        name: "subnet".to_string(),
                        address_prefix: SUBNET_PREFIX.to_string(),
                        nat_gateway: nat_gateway.id.resolve().await?,
                    },
                },
            )
            .await?;

        let network_security_group = self
            .provider
            .create_network_security_group(
                "nsg",
                NetworkSecurityGroupArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    security_rules: self.cluster_security_rules(),
                },
            )
            .await?;

        let ingress_ip = self
            .provider
            .create_public_ip(
                "public-ip",
                self.public_ip_args(spec, Some(PublicIpSku::Standard)),
            )
            .await?;

        let load_balancer = self
            .provider
            .create_load_balancer(
                "lb",
                LoadBalancerArgs {
                    resource_group: self.resource_group.clone(),
                    location: spec.region.clone(),
                    frontend: FrontendSpec {
                        name: "talos-fe".to_string(),
                        public_ip: ingress_ip.id.resolve().await?,
                    },
                    backend_pool: BackendPoolSpec {
                        name: "talos-be-pool".to_string(),
                    },
                    probe: ProbeSpec {
                        name: "talos-lb-health".to_string(),
                        port: API_PORT,
                        protocol: RuleProtocol::Tcp,
                    },
                },
            )
            .await?;

        let backend_pool_id = load_balancer.backend_pool_id.resolve().await?;
        let inbound_nat_rule = self
            .provider
            .create_inbound_nat_rule(
                "talos-6443",
                InboundNatRuleArgs {
                    resource_group: self.resource_group.clone(),
                    load_balancer: load_balancer.name.clone(),
                    frontend: load_balancer.frontend_id.resolve().await?,
                    backend_pool: backend_pool_id.clone(),
                    protocol: RuleProtocol::Tcp,
                    frontend_port_start: API_PORT,
                    frontend_port_end: API_PORT,
                    backend_port: API_PORT,
                },
            )
            .await?;

        let subnet_id = virtual_network.subnet_id.resolve().await?;
        let nsg_id = network_security_group.id.resolve().await?;

        let mut control_interfaces = Vec::with_capacity(spec.control_count as usize);
        for i in 0..spec.control_count {
            let public_ip = self
                .provider
                .create_public_ip(
                    &format!("controlplane-public-ip-{i}"),
                    self.public_ip_args(spec, None),
                )
                .await?;
            let nic_name = format!("controlplane-nic-{i}");
            let interface = self
                .provider
                .create_network_interface(
                    &nic_name,
                    NetworkInterfaceArgs {
                        resource_group: self.resource_group.clone(),
                        location: spec.region.clone(),
                        network_security_group: nsg_id.clone(),
                        ip_configuration: IpConfigurationSpec {
                            name: format!("{nic_name}-ip-conf"),
                            subnet: subnet_id.clone(),
                            public_ip: Some(public_ip.id.resolve().await?),
                        },
                        backend_pool: None,
                    },
                )
                .await?;
            debug!(nic = %interface.name, "created control-plane interface");
            control_interfaces.push(ControlInterface {
                interface,
                public_ip,
            });
        }

        // Workers reach the API through the pool; no dedicated addresses.
        let mut worker_interfaces = Vec::with_capacity(spec.worker_count as usize);
        for i in 0..spec.worker_count {
            let nic_name = format!("worker-nic-{i}");
            let interface = self
                .provider
                .create_network_interface(
                    &nic_name,
                    NetworkInterfaceArgs {
                        resource_group: self.resource_group.clone(),
                        location: spec.region.clone(),
                        network_security_group: nsg_id.clone(),
                        ip_configuration: IpConfigurationSpec {
                            name: format!("{nic_name}-ip-conf"),
                            subnet: subnet_id.clone(),
                            public_ip: None,
                        },
                        backend_pool: Some(backend_pool_id.clone()),
                    },
                )
                .await?;
            debug!(nic = %interface.name, "created worker interface");
            worker_interfaces.push(interface);
        }

        info!(
            controls = spec.control_count,
            workers = spec.worker_count,
            "network topology built"
        );

        Ok(NetworkPlan {
            virtual_network,
            network_security_group,
            egress_ip,
            nat_gateway,
            ingress_ip,
            load_balancer,
            inbound_nat_rule,
            control_interfaces,
            worker_interfaces,
        })
    }

    fn public_ip_args(&self, spec: &ClusterTopologySpec, sku: Option<PublicIpSku>) -> PublicIpArgs {
        PublicIpArgs {
            resource_group: self.resource_group.clone(),
            location: spec.region.clone(),
            allocation_method: IpAllocationMethod::Static,
            sku,
        }
    }

    fn cluster_security_rules(&self) -> Vec<SecurityRuleSpec> {
        CLUSTER_INGRESS_PORTS
            .iter()
            .map(|(name, ports)| self.inbound_allow_rule(name, ports))
            .collect()
    }

    fn inbound_allow_rule(&self, name: &str, destination_port_range: &str) -> SecurityRuleSpec {
        SecurityRuleSpec {
            name: name.to_string(),
            priority: self.priorities.next(),
            direction: RuleDirection::Inbound,
            access: RuleAccess::Allow,
            protocol: RuleProtocol::Tcp,
            source_port_range: "*".to_string(),
            destination_port_range: destination_port_range.to_string(),
            source_address_prefix: "*".to_string(),
            destination_address_prefix: "*".to_string(),
        }
    }
}
