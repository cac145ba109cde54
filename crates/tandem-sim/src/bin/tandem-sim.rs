use std::path::PathBuf;

use clap::Parser;
use tandem_node::config::SubsystemConfig;
use tandem_sim::{DeviceBehavior, Scenario, SimHarness};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Run user-info scenarios against a simulated paired device",
    long_about = None
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Scenario to run; all of them when omitted
    #[arg(long, short, value_enum)]
    scenario: Option<Scenario>,
    /// Device acknowledgments omit the transfer identity
    #[arg(long)]
    no_echo_identity: bool,
}

#[tokio::main]
async fn main() {
    let filter = std::env::var("TANDEM_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = match SubsystemConfig::load(cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("config load failed: {err}");
            std::process::exit(1);
        }
    };
    info!(?config, "starting transfer subsystem");

    let behavior = DeviceBehavior {
        echo_identity: !cli.no_echo_identity,
        ..DeviceBehavior::default()
    };
    let harness = SimHarness::start(config, behavior);

    let scenarios = match cli.scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    let mut failures = 0usize;
    for scenario in scenarios {
        match harness.run(scenario).await {
            Ok(records) => {
                let rendered = serde_json::to_string(&records)
                    .unwrap_or_else(|err| format!("<unprintable: {err}>"));
                println!("ok   {}: {rendered}", scenario.name());
            }
            Err(err) => {
                error!(scenario = scenario.name(), "{err}");
                println!("FAIL {}: {err}", scenario.name());
                failures += 1;
            }
        }
    }

    match harness.shutdown().await {
        Ok(closed) if closed > 0 => info!(closed, "pending transfers closed on shutdown"),
        Ok(_) => {}
        Err(err) => error!("shutdown failed: {err}"),
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
