//! In-memory provider pair backing the preview mode and the test suite.
//!
//! `SimulatedCloudProvider` materializes every request synchronously with
//! deterministic ARM-style identifiers and addresses from documentation
//! ranges, records what it created for later inspection, and supports two
//! fault-injection modes: rejecting a named create call outright and
//! leaving a named resource's computed attributes forever unresolved.
//! `SimulatedBootstrapProvider` fabricates placeholder secret material
//! and renders the per-role bootstrap documents.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::Serialize;
use tracing::debug;

use crate::error::{StratoformError, StratoformResult};
use crate::machine::{ClusterClientConfig, MachineConfiguration, MachineSecrets};
use crate::output::Output;
use crate::provider::{BootstrapProvider, CloudProvider};
use crate::resources::{
    AvailabilitySet, AvailabilitySetArgs, InboundNatRule, InboundNatRuleArgs, LoadBalancer,
    LoadBalancerArgs, NatGateway, NatGatewayArgs, NetworkInterface, NetworkInterfaceArgs,
    NetworkSecurityGroup, NetworkSecurityGroupArgs, PublicIp, PublicIpArgs, ResourceGroup,
    ResourceGroupArgs, SecurityRuleSpec, StorageAccount, StorageAccountArgs, StorageAccountKey,
    VirtualMachine, VirtualMachineArgs, VirtualNetwork, VirtualNetworkArgs,
};
use crate::types::{NodeRole, ResourceId};

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// ARM resource types the simulated engine reports in its records.
pub mod kinds {
    pub const RESOURCE_GROUP: &str = "Microsoft.Resources/resourceGroups";
    pub const STORAGE_ACCOUNT: &str = "Microsoft.Storage/storageAccounts";
    pub const VIRTUAL_NETWORK: &str = "Microsoft.Network/virtualNetworks";
    pub const NETWORK_SECURITY_GROUP: &str = "Microsoft.Network/networkSecurityGroups";
    pub const PUBLIC_IP: &str = "Microsoft.Network/publicIPAddresses";
    pub const NAT_GATEWAY: &str = "Microsoft.Network/natGateways";
    pub const LOAD_BALANCER: &str = "Microsoft.Network/loadBalancers";
    pub const INBOUND_NAT_RULE: &str = "Microsoft.Network/loadBalancers/inboundNatRules";
    pub const NETWORK_INTERFACE: &str = "Microsoft.Network/networkInterfaces";
    pub const AVAILABILITY_SET: &str = "Microsoft.Compute/availabilitySets";
    pub const VIRTUAL_MACHINE: &str = "Microsoft.Compute/virtualMachines";
}

/// One create-or-update request the simulated engine admitted, in
/// admission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub kind: &'static str,
    pub name: String,
}

#[derive(Default)]
struct SimState {
    records: Vec<ResourceRecord>,
    fail_names: HashSet<String>,
    unresolvable_names: HashSet<String>,
    public_ip_count: u8,
    private_ip_count: u8,
    security_rules: HashMap<String, Vec<SecurityRuleSpec>>,
    interfaces: Vec<(String, NetworkInterfaceArgs)>,
    machines: Vec<(String, VirtualMachineArgs)>,
    storage_accounts: HashSet<String>,
}

#[derive(Default)]
pub struct SimulatedCloudProvider {
    state: Mutex<SimState>,
}

fn resolved<T: Clone + Send + Sync + 'static>(attribute: String, value: T) -> Output<T> {
    let (promise, output) = Output::pending(attribute);
    promise.fulfill(value);
    output
}

fn unresolvable<T: Clone + Send + Sync + 'static>(attribute: String) -> Output<T> {
    let (promise, output) = Output::pending(attribute);
    drop(promise);
    output
}

fn attr<T: Clone + Send + Sync + 'static>(stuck: bool, attribute: String, value: T) -> Output<T> {
    if stuck {
        unresolvable(attribute)
    } else {
        resolved(attribute, value)
    }
}

fn group_id(name: &str) -> ResourceId {
    ResourceId::new(format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{name}"))
}

fn arm_id(resource_group: &str, kind: &str, name: &str) -> ResourceId {
    ResourceId::new(format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/{resource_group}/providers/{kind}/{name}"
    ))
}

impl SimulatedCloudProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the engine reject the named create call.
    pub fn fail_resource(&self, name: &str) {
        self.state.lock().fail_names.insert(name.to_string());
    }

    /// Admit the named resource but never resolve its computed
    /// attributes.
    pub fn drop_resolution(&self, name: &str) {
        self.state.lock().unresolvable_names.insert(name.to_string());
    }

    pub fn records(&self) -> Vec<ResourceRecord> {
        self.state.lock().records.clone()
    }

    pub fn created_count(&self, kind: &str) -> usize {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn created_names(&self, kind: &str) -> Vec<String> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.name.clone())
            .collect()
    }

    /// Security rules of the named group, in creation order.
    pub fn security_rules(&self, network_security_group: &str) -> Vec<SecurityRuleSpec> {
        self.state
            .lock()
            .security_rules
            .get(network_security_group)
            .cloned()
            .unwrap_or_default()
    }

    pub fn network_interfaces(&self) -> Vec<(String, NetworkInterfaceArgs)> {
        self.state.lock().interfaces.clone()
    }

    pub fn virtual_machines(&self) -> Vec<(String, VirtualMachineArgs)> {
        self.state.lock().machines.clone()
    }

    /// Record the request unless it is marked for rejection. Returns
    /// whether the resource's attributes should stay unresolved.
    fn admit(&self, kind: &'static str, name: &str) -> StratoformResult<bool> {
        let mut state = self.state.lock();
        if state.fail_names.contains(name) {
            return Err(StratoformError::Provider {
                resource: name.to_string(),
                operation: format!("create {kind}"),
                message: "rejected by fault injection".to_string(),
            });
        }
        state.records.push(ResourceRecord {
            kind,
            name: name.to_string(),
        });
        debug!(kind, name, "admitted resource request");
        Ok(state.unresolvable_names.contains(name))
    }

    fn next_public_ip(&self) -> String {
        let mut state = self.state.lock();
        state.public_ip_count += 1;
        format!("203.0.113.{}", 9 + state.public_ip_count)
    }

    fn next_private_ip(&self) -> String {
        let mut state = self.state.lock();
        state.private_ip_count += 1;
        format!("10.0.0.{}", 9 + state.private_ip_count)
    }
}

#[async_trait]
impl CloudProvider for SimulatedCloudProvider {
    async fn create_resource_group(
        &self,
        name: &str,
        _args: ResourceGroupArgs,
    ) -> StratoformResult<ResourceGroup> {
        let stuck = self.admit(kinds::RESOURCE_GROUP, name)?;
        Ok(ResourceGroup {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), group_id(name)),
        })
    }

    async fn create_storage_account(
        &self,
        name: &str,
        args: StorageAccountArgs,
    ) -> StratoformResult<StorageAccount> {
        let stuck = self.admit(kinds::STORAGE_ACCOUNT, name)?;
        self.state.lock().storage_accounts.insert(name.to_string());
        Ok(StorageAccount {
            name: name.to_string(),
            id: attr(
                stuck,
                format!("{name}.id"),
                arm_id(&args.resource_group, kinds::STORAGE_ACCOUNT, name),
            ),
            primary_blob_endpoint: attr(
                stuck,
                format!("{name}.primaryEndpoints.blob"),
                format!("https://{name}.blob.core.windows.net/"),
            ),
        })
    }

    async fn storage_account_keys(
        &self,
        _resource_group: &str,
        account: &str,
    ) -> StratoformResult<Vec<StorageAccountKey>> {
        if !self.state.lock().storage_accounts.contains(account) {
            return Err(StratoformError::Provider {
                resource: account.to_string(),
                operation: "list storage account keys".to_string(),
                message: "storage account does not exist".to_string(),
            });
        }
        Ok(vec![
            StorageAccountKey {
                key_name: "key1".to_string(),
                value: BASE64.encode(format!("{account}/key1")),
            },
            StorageAccountKey {
                key_name: "key2".to_string(),
                value: BASE64.encode(format!("{account}/key2")),
            },
        ])
    }

    async fn create_virtual_network(
        &self,
        name: &str,
        args: VirtualNetworkArgs,
    ) -> StratoformResult<VirtualNetwork> {
        let stuck = self.admit(kinds::VIRTUAL_NETWORK, name)?;
        let id = arm_id(&args.resource_group, kinds::VIRTUAL_NETWORK, name);
        let subnet_id = ResourceId::new(format!("{id}/subnets/{}", args.subnet.name));
        Ok(VirtualNetwork {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
            subnet_id: attr(stuck, format!("{name}.subnets[0].id"), subnet_id),
        })
    }

    async fn create_network_security_group(
        &self,
        name: &str,
        args: NetworkSecurityGroupArgs,
    ) -> StratoformResult<NetworkSecurityGroup> {
        let stuck = self.admit(kinds::NETWORK_SECURITY_GROUP, name)?;
        let id = arm_id(&args.resource_group, kinds::NETWORK_SECURITY_GROUP, name);
        self.state
            .lock()
            .security_rules
            .insert(name.to_string(), args.security_rules);
        Ok(NetworkSecurityGroup {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
        })
    }

    async fn create_public_ip(
        &self,
        name: &str,
        args: PublicIpArgs,
    ) -> StratoformResult<PublicIp> {
        let stuck = self.admit(kinds::PUBLIC_IP, name)?;
        let id = arm_id(&args.resource_group, kinds::PUBLIC_IP, name);
        let address = self.next_public_ip();
        Ok(PublicIp {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
            ip_address: attr(stuck, format!("{name}.ipAddress"), address),
        })
    }

    async fn create_nat_gateway(
        &self,
        name: &str,
        args: NatGatewayArgs,
    ) -> StratoformResult<NatGateway> {
        let stuck = self.admit(kinds::NAT_GATEWAY, name)?;
        Ok(NatGateway {
            name: name.to_string(),
            id: attr(
                stuck,
                format!("{name}.id"),
                arm_id(&args.resource_group, kinds::NAT_GATEWAY, name),
            ),
        })
    }

    async fn create_load_balancer(
        &self,
        name: &str,
        args: LoadBalancerArgs,
    ) -> StratoformResult<LoadBalancer> {
        let stuck = self.admit(kinds::LOAD_BALANCER, name)?;
        let id = arm_id(&args.resource_group, kinds::LOAD_BALANCER, name);
        let frontend_id =
            ResourceId::new(format!("{id}/frontendIPConfigurations/{}", args.frontend.name));
        let backend_pool_id =
            ResourceId::new(format!("{id}/backendAddressPools/{}", args.backend_pool.name));
        Ok(LoadBalancer {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
            frontend_id: attr(
                stuck,
                format!("{name}.frontendIPConfigurations[0].id"),
                frontend_id,
            ),
            backend_pool_id: attr(
                stuck,
                format!("{name}.backendAddressPools[0].id"),
                backend_pool_id,
            ),
        })
    }

    async fn create_inbound_nat_rule(
        &self,
        name: &str,
        args: InboundNatRuleArgs,
    ) -> StratoformResult<InboundNatRule> {
        let stuck = self.admit(kinds::INBOUND_NAT_RULE, name)?;
        let id = ResourceId::new(format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{}/providers/{}/{}/{name}",
            args.resource_group,
            kinds::LOAD_BALANCER,
            args.load_balancer,
        ));
        Ok(InboundNatRule {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
        })
    }

    async fn create_network_interface(
        &self,
        name: &str,
        args: NetworkInterfaceArgs,
    ) -> StratoformResult<NetworkInterface> {
        let stuck = self.admit(kinds::NETWORK_INTERFACE, name)?;
        let id = arm_id(&args.resource_group, kinds::NETWORK_INTERFACE, name);
        let address = self.next_private_ip();
        self.state
            .lock()
            .interfaces
            .push((name.to_string(), args));
        Ok(NetworkInterface {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
            private_ip: attr(stuck, format!("{name}.privateIPAddress"), address),
        })
    }

    async fn create_availability_set(
        &self,
        name: &str,
        args: AvailabilitySetArgs,
    ) -> StratoformResult<AvailabilitySet> {
        let stuck = self.admit(kinds::AVAILABILITY_SET, name)?;
        Ok(AvailabilitySet {
            name: name.to_string(),
            id: attr(
                stuck,
                format!("{name}.id"),
                arm_id(&args.resource_group, kinds::AVAILABILITY_SET, name),
            ),
        })
    }

    async fn create_virtual_machine(
        &self,
        name: &str,
        args: VirtualMachineArgs,
    ) -> StratoformResult<VirtualMachine> {
        let stuck = self.admit(kinds::VIRTUAL_MACHINE, name)?;
        let id = arm_id(&args.resource_group, kinds::VIRTUAL_MACHINE, name);
        self.state.lock().machines.push((name.to_string(), args));
        Ok(VirtualMachine {
            name: name.to_string(),
            id: attr(stuck, format!("{name}.id"), id),
        })
    }
}

// ---------------------------------------------------------------------------
// Bootstrap provider
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BootstrapState {
    secrets_generated: usize,
    client_configurations: usize,
    machine_configuration_roles: Vec<NodeRole>,
}

/// Fabricates placeholder secret material and renders bootstrap
/// documents. The material is random but structurally shaped like the
/// real thing, so downstream wiring can be exercised end to end.
#[derive(Default)]
pub struct SimulatedBootstrapProvider {
    state: Mutex<BootstrapState>,
}

#[derive(Serialize)]
struct MachineConfigDoc<'a> {
    version: &'static str,
    machine: MachineDoc<'a>,
    cluster: ClusterDoc<'a>,
}

#[derive(Serialize)]
struct MachineDoc<'a> {
    #[serde(rename = "type")]
    machine_type: &'a str,
    token: &'a str,
    ca: CaDoc<'a>,
}

#[derive(Serialize)]
struct CaDoc<'a> {
    crt: &'a str,
}

#[derive(Serialize)]
struct ClusterDoc<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "controlPlane")]
    control_plane: ControlPlaneDoc<'a>,
}

#[derive(Serialize)]
struct ControlPlaneDoc<'a> {
    endpoint: &'a str,
}

fn random_token(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn placeholder_pem(label: &str, rng: &mut impl Rng) -> String {
    let mut raw = [0u8; 48];
    rng.fill(&mut raw[..]);
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        BASE64.encode(raw)
    )
}

impl SimulatedBootstrapProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn secrets_generated(&self) -> usize {
        self.state.lock().secrets_generated
    }

    pub fn client_configurations_derived(&self) -> usize {
        self.state.lock().client_configurations
    }

    /// Roles that machine configurations were derived for, in call order.
    pub fn machine_configuration_roles(&self) -> Vec<NodeRole> {
        self.state.lock().machine_configuration_roles.clone()
    }
}

#[async_trait]
impl BootstrapProvider for SimulatedBootstrapProvider {
    async fn generate_secrets(&self, cluster_name: &str) -> StratoformResult<MachineSecrets> {
        let mut rng = thread_rng();
        let mut cluster_id = [0u8; 32];
        rng.fill(&mut cluster_id[..]);
        self.state.lock().secrets_generated += 1;
        debug!(cluster_name, "generated simulated machine secrets");
        Ok(MachineSecrets {
            cluster_id: BASE64.encode(cluster_id),
            bootstrap_token: format!(
                "{}.{}",
                random_token(&mut rng, 6),
                random_token(&mut rng, 16)
            ),
            ca_certificate: placeholder_pem("CERTIFICATE", &mut rng),
            client_certificate: placeholder_pem("CERTIFICATE", &mut rng),
            client_key: placeholder_pem("ED25519 PRIVATE KEY", &mut rng),
        })
    }

    async fn client_configuration(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        nodes: Vec<String>,
    ) -> StratoformResult<ClusterClientConfig> {
        self.state.lock().client_configurations += 1;
        Ok(ClusterClientConfig {
            cluster_name: cluster_name.to_string(),
            nodes,
            ca_certificate: secrets.ca_certificate.clone(),
            client_certificate: secrets.client_certificate.clone(),
            client_key: secrets.client_key.clone(),
        })
    }

    async fn machine_configuration(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        endpoint: &str,
        role: NodeRole,
    ) -> StratoformResult<MachineConfiguration> {
        let document = serde_yaml::to_string(&MachineConfigDoc {
            version: "v1alpha1",
            machine: MachineDoc {
                machine_type: role.as_str(),
                token: &secrets.bootstrap_token,
                ca: CaDoc {
                    crt: &secrets.ca_certificate,
                },
            },
            cluster: ClusterDoc {
                id: &secrets.cluster_id,
                name: cluster_name,
                control_plane: ControlPlaneDoc { endpoint },
            },
        })
        .map_err(|e| StratoformError::Serialization {
            operation: format!("render {role} machine configuration"),
            message: e.to_string(),
        })?;
        self.state.lock().machine_configuration_roles.push(role);
        Ok(MachineConfiguration { role, document })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{IpAllocationMethod, PublicIpSku};

    fn public_ip_args() -> PublicIpArgs {
        PublicIpArgs {
            resource_group: "rg".to_string(),
            location: "westeurope".to_string(),
            allocation_method: IpAllocationMethod::Static,
            sku: Some(PublicIpSku::Standard),
        }
    }

    #[tokio::test]
    async fn allocated_addresses_are_distinct() {
        let provider = SimulatedCloudProvider::new();
        let a = provider.create_public_ip("a", public_ip_args()).await.unwrap();
        let b = provider.create_public_ip("b", public_ip_args()).await.unwrap();
        assert_ne!(
            a.ip_address.resolve().await.unwrap(),
            b.ip_address.resolve().await.unwrap()
        );
    }

    #[tokio::test]
    async fn fault_injection_rejects_the_named_request() {
        let provider = SimulatedCloudProvider::new();
        provider.fail_resource("doomed");
        let err = provider
            .create_public_ip("doomed", public_ip_args())
            .await
            .unwrap_err();
        match err {
            StratoformError::Provider { resource, .. } => assert_eq!(resource, "doomed"),
            other => panic!("expected provider error, got {other}"),
        }
        assert_eq!(provider.created_count(kinds::PUBLIC_IP), 0);
    }

    #[tokio::test]
    async fn dropped_resolution_blocks_attribute_consumers() {
        let provider = SimulatedCloudProvider::new();
        provider.drop_resolution("stuck");
        let ip = provider
            .create_public_ip("stuck", public_ip_args())
            .await
            .unwrap();
        assert!(matches!(
            ip.ip_address.resolve().await,
            Err(StratoformError::DependencyResolution { .. })
        ));
        // The request itself was admitted.
        assert_eq!(provider.created_count(kinds::PUBLIC_IP), 1);
    }

    #[tokio::test]
    async fn storage_keys_require_the_account() {
        let provider = SimulatedCloudProvider::new();
        assert!(provider.storage_account_keys("rg", "missing").await.is_err());
    }

    #[tokio::test]
    async fn role_is_the_only_divergence_between_documents() {
        let bootstrap = SimulatedBootstrapProvider::new();
        let secrets = bootstrap.generate_secrets("demo").await.unwrap();
        let endpoint = "https://203.0.113.10:6443";
        let control = bootstrap
            .machine_configuration(&secrets, "demo", endpoint, NodeRole::Controlplane)
            .await
            .unwrap();
        let worker = bootstrap
            .machine_configuration(&secrets, "demo", endpoint, NodeRole::Worker)
            .await
            .unwrap();
        assert_ne!(control.document, worker.document);
        assert!(control.document.contains("type: controlplane"));
        assert!(worker.document.contains("type: worker"));
        // Same secrets and endpoint flow into both.
        assert!(control.document.contains(endpoint));
        assert!(worker.document.contains(endpoint));
        assert_eq!(
            bootstrap.machine_configuration_roles(),
            vec![NodeRole::Controlplane, NodeRole::Worker]
        );
    }

    #[tokio::test]
    async fn secret_material_differs_between_generations() {
        let bootstrap = SimulatedBootstrapProvider::new();
        let first = bootstrap.generate_secrets("demo").await.unwrap();
        let second = bootstrap.generate_secrets("demo").await.unwrap();
        assert_ne!(first.bootstrap_token, second.bootstrap_token);
        assert_ne!(first.cluster_id, second.cluster_id);
        assert_eq!(bootstrap.secrets_generated(), 2);
    }
}
