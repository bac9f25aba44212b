mod config;
mod simulator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::SweeperConfig;
use dotenv::dotenv;
use simulator::Simulation;
use sweep_core::{setup_logger, Asset, JsonPlanFile, PlanLoader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(long, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a batch plan against the seeded in-memory ledger
    Simulate {
        #[arg(short, long)]
        plan: String,
        #[arg(long)]
        export_metrics: Option<String>,
    },
    /// Validate a batch plan without moving funds
    Check {
        #[arg(short, long)]
        plan: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let _log_guard = setup_logger(&args.log_dir);

    info!("Loading config from: {}", args.config);
    let config = SweeperConfig::load(&args.config).context("Failed to load config")?;

    let plan_path = match &args.command {
        Commands::Simulate { plan, .. } | Commands::Check { plan } => plan,
    };
    let plan = JsonPlanFile::new(plan_path)
        .load_plan()
        .await?
        .resolve()
        .with_context(|| format!("Invalid plan {}", plan_path))?;
    info!(
        "Loaded plan for {:?}: {} entries, {} native supplied",
        plan.requester,
        plan.request.entries.len(),
        plan.supplied_native
    );

    let mut simulation = Simulation::from_config(&config)?;

    match args.command {
        Commands::Check { .. } => match simulation.check(&plan) {
            Ok(preflight) => {
                info!(
                    "Plan OK: {} entries, deferred entry: {:?}, bridged: {}",
                    preflight.entries,
                    preflight.deferred_index,
                    preflight.bridged()
                );
            }
            Err(e) => {
                error!("Plan rejected: {}", e);
                return Err(e.into());
            }
        },
        Commands::Simulate { export_metrics, .. } => {
            let outcome = simulation.run(&plan);

            info!(
                "Requester balances: native {}, target {}",
                simulation.balance(plan.requester, Asset::Native),
                simulation.target_balance(plan.requester)
            );

            if let Some(path) = export_metrics {
                simulation
                    .metrics()
                    .export_to_file(&path)
                    .await
                    .with_context(|| format!("Failed to export metrics to {}", path))?;
                info!("Metrics exported to {}", path);
            }

            outcome?;
        }
    }

    Ok(())
}
