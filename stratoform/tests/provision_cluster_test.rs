//! End-to-end provisioning against the simulated engine.

use std::collections::HashSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use stratoform::orchestrator::{Orchestrator, CLIENT_CONFIG_PATH};
use stratoform_core::provider::simulated::{
    kinds, SimulatedBootstrapProvider, SimulatedCloudProvider,
};
use stratoform_core::provider::{BootstrapProvider, CloudProvider};
use stratoform_core::types::ClusterTopologySpec;

fn demo_spec() -> ClusterTopologySpec {
    ClusterTopologySpec {
        region: "westeurope".to_string(),
        cluster_name: "demo".to_string(),
        control_count: 3,
        worker_count: 2,
        architecture: "talos-x64".to_string(),
        talos_version: "1.7.6".to_string(),
        vm_size: "Standard_B2s".to_string(),
    }
}

struct Harness {
    cloud: Arc<SimulatedCloudProvider>,
    bootstrap: Arc<SimulatedBootstrapProvider>,
    orchestrator: Orchestrator,
    _workdir: tempfile::TempDir,
    workdir_path: std::path::PathBuf,
}

fn harness() -> Harness {
    let cloud = Arc::new(SimulatedCloudProvider::new());
    let bootstrap = Arc::new(SimulatedBootstrapProvider::new());
    let workdir = tempfile::tempdir().unwrap();
    let workdir_path = workdir.path().to_path_buf();
    let orchestrator = Orchestrator::new(
        Arc::clone(&cloud) as Arc<dyn CloudProvider>,
        Arc::clone(&bootstrap) as Arc<dyn BootstrapProvider>,
    )
    .with_output_root(&workdir_path);
    Harness {
        cloud,
        bootstrap,
        orchestrator,
        _workdir: workdir,
        workdir_path,
    }
}

#[tokio::test]
async fn demo_topology_creates_the_expected_compute_shape() {
    let h = harness();
    h.orchestrator.run(&demo_spec()).await.unwrap();

    assert_eq!(h.cloud.created_count(kinds::AVAILABILITY_SET), 1);

    let machines = h.cloud.virtual_machines();
    let names: Vec<&str> = machines.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["control-0", "control-1", "control-2", "worker-0", "worker-1"]
    );

    // Every node references the one availability grouping.
    let groupings: HashSet<_> = machines
        .iter()
        .map(|(_, args)| args.availability_set.clone())
        .collect();
    assert_eq!(groupings.len(), 1);

    // Shared node shape regardless of role.
    for (_, args) in &machines {
        assert_eq!(args.vm_size, "Standard_B2s");
        assert_eq!(args.os_disk.size_gb, 10);
        assert!(args.boot_diagnostics.enabled);
        assert!(args
            .image
            .community_gallery_image_id
            .contains("/Images/talos-x64/Versions/1.7.6"));
    }
}

#[tokio::test]
async fn interfaces_split_dedicated_ips_and_pool_membership_by_role() {
    let h = harness();
    h.orchestrator.run(&demo_spec()).await.unwrap();

    let interfaces = h.cloud.network_interfaces();
    assert_eq!(interfaces.len(), 5);

    let mut control_ips = HashSet::new();
    for (name, args) in &interfaces {
        if name.starts_with("controlplane-nic-") {
            let ip = args.ip_configuration.public_ip.clone().expect("dedicated IP");
            assert!(control_ips.insert(ip), "dedicated IPs must be unique");
            assert!(args.backend_pool.is_none());
        } else {
            assert!(name.starts_with("worker-nic-"));
            assert!(args.ip_configuration.public_ip.is_none());
            assert!(args.backend_pool.is_some(), "workers join the backend pool");
        }
    }
    assert_eq!(control_ips.len(), 3);

    // 3 dedicated control IPs plus ingress and egress addresses.
    assert_eq!(h.cloud.created_count(kinds::PUBLIC_IP), 5);
}

#[tokio::test]
async fn security_rules_are_fixed_and_priorities_increase() {
    let h = harness();
    h.orchestrator.run(&demo_spec()).await.unwrap();

    let rules = h.cloud.security_rules("nsg");
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["apid", "trustd", "etcd", "kube"]);

    let priorities: Vec<u32> = rules.iter().map(|r| r.priority).collect();
    assert!(priorities[0] > 1000);
    assert!(priorities.windows(2).all(|w| w[0] < w[1]));
    let distinct: HashSet<_> = priorities.iter().collect();
    assert_eq!(distinct.len(), rules.len());
}

#[tokio::test]
async fn custom_data_is_the_encoded_role_document() {
    let h = harness();
    h.orchestrator.run(&demo_spec()).await.unwrap();

    for (name, args) in h.cloud.virtual_machines() {
        let decoded = BASE64.decode(&args.os_profile.custom_data).unwrap();
        let document = String::from_utf8(decoded).unwrap();
        if name.starts_with("control-") {
            assert!(document.contains("type: controlplane"));
        } else {
            assert!(document.contains("type: worker"));
        }
        // Both roles bootstrap against the public ingress endpoint.
        assert!(document.contains("https://"));
        assert!(document.contains(":6443"));
    }

    // One derivation per role, one secrets generation.
    assert_eq!(h.bootstrap.secrets_generated(), 1);
    assert_eq!(h.bootstrap.machine_configuration_roles().len(), 2);
}

#[tokio::test]
async fn outputs_and_client_config_are_published() {
    let h = harness();
    let outputs = h.orchestrator.run(&demo_spec()).await.unwrap();

    let ingress = outputs.get("PublicIp.IpAddress").unwrap().as_str().unwrap();
    assert_eq!(
        outputs.get("LoadBalancer.IpAddress").unwrap().as_str().unwrap(),
        ingress
    );
    assert_ne!(
        outputs.get("NatGateway.IpAddress").unwrap().as_str().unwrap(),
        ingress
    );
    assert_eq!(outputs.get("Vnet.Name").unwrap().as_str().unwrap(), "vnet");
    assert_eq!(
        outputs.get("storageAccount.Name").unwrap().as_str().unwrap(),
        "sa"
    );
    assert!(outputs.get("primaryStorageKey").is_some());

    let interfaces = outputs.get("NetworkInterfaces").unwrap().as_array().unwrap();
    assert_eq!(interfaces.len(), 5);

    let rendered = outputs.get("clusterClientCfg").unwrap().as_str().unwrap();
    assert!(rendered.contains("context: demo"));
    assert!(rendered.contains(ingress));

    let written = std::fs::read_to_string(h.workdir_path.join(CLIENT_CONFIG_PATH)).unwrap();
    assert_eq!(written, rendered);
}

#[tokio::test]
async fn zero_count_topologies_are_valid() {
    let h = harness();
    let mut spec = demo_spec();
    spec.control_count = 0;
    spec.worker_count = 0;
    h.orchestrator.run(&spec).await.unwrap();

    assert_eq!(h.cloud.created_count(kinds::NETWORK_INTERFACE), 0);
    assert_eq!(h.cloud.created_count(kinds::VIRTUAL_MACHINE), 0);
    // The shared topology is still built.
    assert_eq!(h.cloud.created_count(kinds::LOAD_BALANCER), 1);
    assert_eq!(h.cloud.created_count(kinds::NAT_GATEWAY), 1);
    assert_eq!(h.cloud.created_count(kinds::AVAILABILITY_SET), 1);
}
