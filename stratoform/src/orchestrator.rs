//! End-to-end provisioning sequence and stack outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use stratoform_core::error::{StratoformError, StratoformResult};
use stratoform_core::provider::{BootstrapProvider, CloudProvider};
use stratoform_core::resources::{ResourceGroup, ResourceGroupArgs, StorageAccount, StorageAccountArgs};
use stratoform_core::types::ClusterTopologySpec;

use crate::cluster::compute::{ComputeProvisioner, ProvisionComputeParams};
use crate::cluster::secrets::SecretsAndConfigChain;
use crate::network::{NetworkPlan, NetworkTopologyBuilder, RulePrioritySequence};

/// Fixed relative path the rendered client configuration is written to,
/// overwritten on each successful run.
pub const CLIENT_CONFIG_PATH: &str = "secrets/talosconfig";

/// Exported key/value summary of a run.
#[derive(Debug, Default)]
pub struct StackOutputs {
    values: BTreeMap<String, Value>,
}

impl StackOutputs {
    fn export(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn to_json(&self) -> StratoformResult<String> {
        serde_json::to_string_pretty(&self.values).map_err(|e| StratoformError::Serialization {
            operation: "render stack outputs".to_string(),
            message: e.to_string(),
        })
    }
}

/// Sequences the whole run: each stage is gated on the prior stage's
/// resolved outputs, not merely on having issued its requests.
pub struct Orchestrator {
    cloud: Arc<dyn CloudProvider>,
    bootstrap: Arc<dyn BootstrapProvider>,
    output_root: PathBuf,
}

impl Orchestrator {
    pub fn new(cloud: Arc<dyn CloudProvider>, bootstrap: Arc<dyn BootstrapProvider>) -> Self {
        Self {
            cloud,
            bootstrap,
            output_root: PathBuf::from("."),
        }
    }

    /// Directory the client configuration is written under. Defaults to
    /// the working directory.
    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.output_root = root.as_ref().to_path_buf();
        self
    }

    pub async fn run(&self, spec: &ClusterTopologySpec) -> StratoformResult<StackOutputs> {
        info!(
            region = %spec.region,
            cluster = %spec.cluster_name,
            controls = spec.control_count,
            workers = spec.worker_count,
            "provisioning cluster topology"
        );

        let resource_group = self
            .cloud
            .create_resource_group(
                "resourceGroup",
                ResourceGroupArgs {
                    location: spec.region.clone(),
                },
            )
            .await?;

        let storage_account = self
            .cloud
            .create_storage_account(
                "sa",
                StorageAccountArgs {
                    resource_group: resource_group.name.clone(),
                    location: spec.region.clone(),
                    sku_name: "Standard_LRS".to_string(),
                    kind: "StorageV2".to_string(),
                },
            )
            .await?;

        let priorities = RulePrioritySequence::new();
        let network =
            NetworkTopologyBuilder::new(Arc::clone(&self.cloud), &resource_group.name, &priorities)
                .build(spec)
                .await?;

        let chain = SecretsAndConfigChain::new(Arc::clone(&self.bootstrap));
        let secrets = chain.generate_machine_secrets(&spec.cluster_name).await?;
        let client_config = chain
            .client_configuration(&secrets, &spec.cluster_name, &network.ingress_ip.ip_address)
            .await?;
        let machine_configs = chain
            .machine_configurations(&secrets, &spec.cluster_name, &network.ingress_ip.ip_address)
            .await?;

        let compute = ComputeProvisioner::new(Arc::clone(&self.cloud), &resource_group.name);
        let compute_resources = compute
            .provision(ProvisionComputeParams {
                spec,
                network: &network,
                machine_configs: &machine_configs,
                storage_blob_endpoint: &storage_account.primary_blob_endpoint,
            })
            .await?;
        debug!(nodes = compute_resources.nodes.len(), "compute stage complete");

        let rendered = client_config.render()?;
        self.write_client_config(&rendered)?;

        self.export_outputs(&network, &resource_group, &storage_account, rendered)
            .await
    }

    fn write_client_config(&self, rendered: &str) -> StratoformResult<()> {
        let path = self.output_root.join(CLIENT_CONFIG_PATH);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, rendered)?;
        info!(path = %path.display(), "wrote cluster client configuration");
        Ok(())
    }

    async fn export_outputs(
        &self,
        network: &NetworkPlan,
        resource_group: &ResourceGroup,
        storage_account: &StorageAccount,
        rendered_client_config: String,
    ) -> StratoformResult<StackOutputs> {
        let mut outputs = StackOutputs::default();

        let mut interfaces = Vec::new();
        for control in &network.control_interfaces {
            interfaces.push(json!({
                "name": control.interface.name,
                "ip": control.public_ip.ip_address.resolve().await?,
            }));
        }
        for worker in &network.worker_interfaces {
            interfaces.push(json!({
                "name": worker.name,
                "ip": worker.private_ip.resolve().await?,
            }));
        }
        outputs.export("NetworkInterfaces", Value::Array(interfaces));
        outputs.export("Vnet.Name", json!(network.virtual_network.name));

        let ingress = network.ingress_ip.ip_address.resolve().await?;
        outputs.export("PublicIp.IpAddress", json!(ingress));
        outputs.export("LoadBalancer.IpAddress", json!(ingress));
        outputs.export(
            "NatGateway.IpAddress",
            json!(network.egress_ip.ip_address.resolve().await?),
        );

        outputs.export("storageAccount.Name", json!(storage_account.name));
        let keys = self
            .cloud
            .storage_account_keys(&resource_group.name, &storage_account.name)
            .await?;
        if let Some(primary) = keys.first() {
            outputs.export("primaryStorageKey", json!(primary.value));
        }

        outputs.export("clusterClientCfg", json!(rendered_client_config));
        Ok(outputs)
    }
}
