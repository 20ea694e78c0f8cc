//! Secret generation and configuration derivation.
//!
//! The chain is a one-way state machine: secrets are issued at most once
//! per run, and everything derived afterwards references that single
//! instance. Both derivations suspend on the ingress address; nothing
//! here runs until it has resolved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use stratoform_core::error::{StratoformError, StratoformResult};
use stratoform_core::machine::{ClusterClientConfig, MachineConfiguration, MachineSecrets};
use stratoform_core::output::Output;
use stratoform_core::provider::BootstrapProvider;
use stratoform_core::types::{NodeRole, API_PORT};

/// The two per-role bootstrap documents of a run.
pub struct MachineConfigs {
    pub controlplane: MachineConfiguration,
    pub worker: MachineConfiguration,
}

impl MachineConfigs {
    pub fn for_role(&self, role: NodeRole) -> &MachineConfiguration {
        match role {
            NodeRole::Controlplane => &self.controlplane,
            NodeRole::Worker => &self.worker,
        }
    }
}

pub struct SecretsAndConfigChain {
    provider: Arc<dyn BootstrapProvider>,
    issued: AtomicBool,
}

impl SecretsAndConfigChain {
    pub fn new(provider: Arc<dyn BootstrapProvider>) -> Self {
        Self {
            provider,
            issued: AtomicBool::new(false),
        }
    }

    /// Generate the cluster-wide secret material. At most once per run;
    /// the chain enforces single issuance, not the provider.
    pub async fn generate_machine_secrets(
        &self,
        cluster_name: &str,
    ) -> StratoformResult<MachineSecrets> {
        if self.issued.swap(true, Ordering::SeqCst) {
            return Err(StratoformError::ContractViolation {
                message: "machine secrets already generated for this run".to_string(),
            });
        }
        let secrets = self.provider.generate_secrets(cluster_name).await?;
        info!(cluster = cluster_name, "generated machine secrets");
        Ok(secrets)
    }

    /// Administrator client configuration, addressed at the ingress IP.
    pub async fn client_configuration(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        ingress_ip: &Output<String>,
    ) -> StratoformResult<ClusterClientConfig> {
        let ip = ingress_ip.resolve().await?;
        self.provider
            .client_configuration(secrets, cluster_name, vec![ip])
            .await
    }

    /// Per-role bootstrap documents.
    ///
    /// Both roles share the same endpoint, derived from the ingress
    /// address; workers bootstrap against the public load balancer just
    /// like the control plane.
    pub async fn machine_configurations(
        &self,
        secrets: &MachineSecrets,
        cluster_name: &str,
        ingress_ip: &Output<String>,
    ) -> StratoformResult<MachineConfigs> {
        let endpoint = ingress_ip
            .map("cluster-endpoint", |ip| format!("https://{ip}:{API_PORT}"))
            .resolve()
            .await?;
        let controlplane = self
            .provider
            .machine_configuration(secrets, cluster_name, &endpoint, NodeRole::Controlplane)
            .await?;
        let worker = self
            .provider
            .machine_configuration(secrets, cluster_name, &endpoint, NodeRole::Worker)
            .await?;
        Ok(MachineConfigs {
            controlplane,
            worker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratoform_core::provider::simulated::SimulatedBootstrapProvider;

    fn chain() -> (Arc<SimulatedBootstrapProvider>, SecretsAndConfigChain) {
        let provider = Arc::new(SimulatedBootstrapProvider::new());
        let chain = SecretsAndConfigChain::new(Arc::clone(&provider) as Arc<dyn BootstrapProvider>);
        (provider, chain)
    }

    #[tokio::test]
    async fn second_issuance_is_a_contract_violation() {
        let (provider, chain) = chain();
        chain.generate_machine_secrets("demo").await.unwrap();
        assert!(matches!(
            chain.generate_machine_secrets("demo").await,
            Err(StratoformError::ContractViolation { .. })
        ));
        // The provider never saw the second request.
        assert_eq!(provider.secrets_generated(), 1);
    }

    #[tokio::test]
    async fn endpoint_is_derived_from_the_ingress_address() {
        let (_, chain) = chain();
        let secrets = chain.generate_machine_secrets("demo").await.unwrap();
        let ingress = Output::ready("public-ip.ipAddress", "203.0.113.10".to_string());
        let configs = chain
            .machine_configurations(&secrets, "demo", &ingress)
            .await
            .unwrap();
        assert!(configs
            .controlplane
            .document
            .contains("https://203.0.113.10:6443"));
        assert!(configs.worker.document.contains("https://203.0.113.10:6443"));
        assert_ne!(configs.controlplane.document, configs.worker.document);
    }

    #[tokio::test]
    async fn unresolved_ingress_blocks_every_derivation() {
        let (provider, chain) = chain();
        let secrets = chain.generate_machine_secrets("demo").await.unwrap();
        let (promise, ingress) = Output::<String>::pending("public-ip.ipAddress");
        drop(promise);
        assert!(matches!(
            chain.client_configuration(&secrets, "demo", &ingress).await,
            Err(StratoformError::DependencyResolution { .. })
        ));
        assert!(matches!(
            chain.machine_configurations(&secrets, "demo", &ingress).await,
            Err(StratoformError::DependencyResolution { .. })
        ));
        assert_eq!(provider.client_configurations_derived(), 0);
        assert!(provider.machine_configuration_roles().is_empty());
    }
}
