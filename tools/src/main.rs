//! health-runner: headless pipeline runner for the account health monitor.
//!
//! Usage:
//!   health-runner --invoices data/invoices_clean.csv --out outputs
//!   health-runner --mock --seed 7 --accounts 60 --months 30 --out outputs

use account_health_core::{
    invoice::{read_invoices, write_invoices},
    mock::{generate_invoices, MockSpec},
    store::{DOC_ALERTS, TABLE_ALERTS, TABLE_DECLINE, TABLE_HEALTH, TABLE_INVOICES},
    HealthConfig, HealthEngine, HealthStore,
};
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "health-runner")]
#[command(about = "Tier customers, score decline risk and build the rep call list", long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .args(["invoices", "mock"])
        .required(true)
        .multiple(false)
))]
struct Cli {
    /// Tidy invoice CSV (account_name, date, shipped_weight, net_sales)
    #[arg(long)]
    invoices: Option<PathBuf>,

    /// Generate mock invoices instead of reading a file
    #[arg(long)]
    mock: bool,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 40)]
    accounts: usize,

    #[arg(long, default_value_t = 24)]
    months: u32,

    /// JSON config; omitted fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for all tables
    #[arg(long, default_value = "outputs")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HealthConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HealthConfig::default(),
    };

    let store = HealthStore::open(&cli.out)
        .with_context(|| format!("cannot open output directory {}", cli.out.display()))?;

    let invoices = match &cli.invoices {
        Some(path) => read_invoices(path)
            .with_context(|| format!("failed to read invoices from {}", path.display()))?,
        None => {
            let spec = MockSpec {
                seed: cli.seed,
                accounts: cli.accounts,
                months: cli.months,
                ..MockSpec::default()
            };
            let invoices = generate_invoices(&spec);
            let mock_path = cli.out.join(TABLE_INVOICES);
            write_invoices(&mock_path, &invoices)?;
            println!("Generated {} mock invoices -> {}", invoices.len(), mock_path.display());
            invoices
        }
    };

    let run_id = uuid::Uuid::new_v4();
    log::info!("run {run_id}: {} invoice rows", invoices.len());

    let mut engine = HealthEngine::build(config, store, invoices);
    let summary = engine
        .run()
        .with_context(|| format!("run {run_id} failed"))?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    for report in &summary.reports {
        println!("  {:<14}  {} rows", report.stage, report.rows);
    }
    match summary.mean_auc() {
        Some(auc) => println!("  mean CV AUC:    {auc:.3}"),
        None => println!("  mean CV AUC:    (no scorable fold)"),
    }

    println!();
    let store = engine.store();
    for name in [TABLE_HEALTH, TABLE_DECLINE, TABLE_ALERTS, DOC_ALERTS] {
        if let Some(path) = store.path_of(name) {
            println!("  wrote {}", path.display());
        }
    }
    Ok(())
}
