extern crate car_probe;
use car_probe::{DirLister, GatewayProbe, Inspector, ProbeConfig, accumulated_size};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Inspect a CAR file as if it had just landed in the store
#[derive(Debug, Parser)]
struct Args {
    #[arg()]
    car: PathBuf,
    /// local directory standing in for the object store
    #[arg(long, env = "CAR_PROBE_STORE_DIR")]
    store_dir: Option<PathBuf>,
    /// prefix to sum stored sizes under (default: raw/<root>)
    #[arg(long)]
    prefix: Option<String>,
    /// previously recorded structure, trusted only for roots we can't walk
    #[arg(long)]
    structure: Option<String>,
    #[arg(long, env = "CAR_PROBE_GATEWAY_URL", default_value = car_probe::config::DEFAULT_GATEWAY_URL)]
    gateway: String,
    /// actually hit the gateway when the verdict is Attempt
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        car,
        store_dir,
        prefix,
        structure,
        gateway,
        probe,
    } = Args::parse();

    let config = ProbeConfig::new().with_gateway_url(gateway);
    let inspector = Inspector::new(config.clone());

    let bytes = tokio::fs::read(car).await?;
    let mut metadata = HashMap::new();
    if let Some(structure) = structure {
        metadata.insert(car_probe::inspect::STRUCTURE_KEY.to_string(), structure);
    }

    let result = inspector.inspect(&bytes, &metadata).await?;
    log::info!("inspected: {result:?}");

    let stored = match store_dir {
        Some(dir) => {
            let prefix = prefix.unwrap_or_else(|| format!("raw/{}", result.root));
            accumulated_size(&DirLister::new(dir), &prefix).await?
        }
        None => 0,
    };

    let decision = inspector.decide(&result, stored);
    println!(
        "{} {} {:?}: {}",
        result.root, result.structure, decision.verdict, decision.reason
    );

    if probe && decision.should_attempt() {
        let gateway = GatewayProbe::new(&config.gateway_url, config.gateway_timeout)?;
        let outcome = gateway.probe(&result.root).await?;
        println!(
            "{} -> {} ({} bytes in {:?})",
            outcome.url, outcome.status, outcome.bytes, outcome.elapsed
        );
    }

    Ok(())
}
