//! Cluster secret material and the configuration documents derived from
//! it.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

use crate::error::{StratoformError, StratoformResult};
use crate::types::NodeRole;

/// Cluster-wide cryptographic material.
///
/// Generated exactly once per run; every client configuration and
/// bootstrap document references the same instance. Never regenerated or
/// mutated after creation.
#[derive(Debug, Clone)]
pub struct MachineSecrets {
    pub cluster_id: String,
    pub bootstrap_token: String,
    pub ca_certificate: String,
    pub client_certificate: String,
    pub client_key: String,
}

/// Administrator-facing credential bundle used to address and
/// authenticate to the cluster API.
#[derive(Debug, Clone)]
pub struct ClusterClientConfig {
    pub cluster_name: String,
    /// Reachable node addresses; the ingress address in practice.
    pub nodes: Vec<String>,
    pub ca_certificate: String,
    pub client_certificate: String,
    pub client_key: String,
}

#[derive(Serialize)]
struct ClientConfigDoc<'a> {
    context: &'a str,
    contexts: BTreeMap<&'a str, ClientContextDoc<'a>>,
}

#[derive(Serialize)]
struct ClientContextDoc<'a> {
    endpoints: &'a [String],
    nodes: &'a [String],
    ca: &'a str,
    crt: &'a str,
    key: &'a str,
}

impl ClusterClientConfig {
    /// Render the talosconfig-style document handed to the operator.
    pub fn render(&self) -> StratoformResult<String> {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            self.cluster_name.as_str(),
            ClientContextDoc {
                endpoints: &self.nodes,
                nodes: &self.nodes,
                ca: &self.ca_certificate,
                crt: &self.client_certificate,
                key: &self.client_key,
            },
        );
        serde_yaml::to_string(&ClientConfigDoc {
            context: &self.cluster_name,
            contexts,
        })
        .map_err(|e| StratoformError::Serialization {
            operation: "render client configuration".to_string(),
            message: e.to_string(),
        })
    }
}

/// Per-role bootstrap document a node consumes at first boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfiguration {
    pub role: NodeRole,
    pub document: String,
}

impl MachineConfiguration {
    /// The document as VM custom data.
    pub fn custom_data(&self) -> String {
        BASE64.encode(self.document.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> MachineSecrets {
        MachineSecrets {
            cluster_id: "cluster-id".into(),
            bootstrap_token: "token".into(),
            ca_certificate: "ca-cert".into(),
            client_certificate: "client-cert".into(),
            client_key: "client-key".into(),
        }
    }

    #[test]
    fn client_config_renders_context_and_credentials() {
        let secrets = secrets();
        let config = ClusterClientConfig {
            cluster_name: "demo".into(),
            nodes: vec!["203.0.113.10".into()],
            ca_certificate: secrets.ca_certificate,
            client_certificate: secrets.client_certificate,
            client_key: secrets.client_key,
        };
        let rendered = config.render().unwrap();
        assert!(rendered.contains("context: demo"));
        assert!(rendered.contains("203.0.113.10"));
        assert!(rendered.contains("ca: ca-cert"));
        assert!(rendered.contains("key: client-key"));
    }

    #[test]
    fn custom_data_round_trips_through_base64() {
        let text = "version: v1alpha1\nmachine:\n  type: worker\n# trailing ✓";
        let config = MachineConfiguration {
            role: NodeRole::Worker,
            document: text.to_string(),
        };
        let decoded = BASE64.decode(config.custom_data()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }
}
