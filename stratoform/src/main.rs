use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use stratoform::orchestrator::Orchestrator;
use stratoform_core::config;
use stratoform_core::error::{StratoformError, StratoformResult};
use stratoform_core::provider::simulated::{SimulatedBootstrapProvider, SimulatedCloudProvider};
use stratoform_core::provider::{BootstrapProvider, CloudProvider};

/// Preview the resources a cluster topology provisions.
///
/// Runs the full dependency-ordered provisioning sequence against the
/// in-memory engine, prints the stack outputs as JSON, and writes the
/// rendered client configuration under the output directory.
#[derive(Debug, Parser)]
#[command(name = "stratoform", version, about)]
struct Cli {
    /// Path to the cluster topology configuration.
    #[arg(long, default_value = "cluster.toml")]
    config: PathBuf,

    /// Directory the client configuration is written under.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> StratoformResult<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "stratoform=info"
            .parse()
            .map_err(|e| StratoformError::Configuration {
                message: format!("invalid log directive: {e}"),
            })?,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let spec = config::load_topology(&cli.config)?;

    let cloud: Arc<dyn CloudProvider> = Arc::new(SimulatedCloudProvider::new());
    let bootstrap: Arc<dyn BootstrapProvider> = Arc::new(SimulatedBootstrapProvider::new());
    let orchestrator = Orchestrator::new(cloud, bootstrap).with_output_root(&cli.output_dir);

    let outputs = orchestrator.run(&spec).await?;
    println!("{}", outputs.to_json()?);
    Ok(())
}
