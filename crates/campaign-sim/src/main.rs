use std::path::PathBuf;

use anyhow::{Context, Result};
use campaign_orchestration::SelectionStrategy;
use campaign_sim::telemetry::{append_telemetry, init_tracing, write_run_summary};
use campaign_sim::{run_dry_run, CampaignFixture, RunnerConfig};
use clap::Parser;
use tracing::info;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Campaign fixture (brief, creators, scripts) in JSON
    #[arg(long)]
    fixture: PathBuf,

    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Selection strategy (overrides the config file and CAMPAIGN_STRATEGY)
    #[arg(long)]
    strategy: Option<SelectionStrategy>,

    /// Output directory for the summary and telemetry (overrides SIM_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip writing the summary and telemetry files
    #[arg(long, default_value_t = false)]
    no_write: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = RunnerConfig::load(args.config.as_deref())?;
    if let Some(strategy) = args.strategy {
        config.workflow.strategy = strategy;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    let fixture = CampaignFixture::load(&args.fixture)?;
    info!(
        campaign = %fixture.brief.id,
        candidates = fixture.candidates.len(),
        budget = fixture.brief.total_budget,
        "Loaded campaign fixture"
    );

    let outcome = run_dry_run(fixture, &config).await?;
    println!("{}", outcome.summary.report());

    if !args.no_write {
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create output dir {}", config.output_dir.display())
        })?;
        write_run_summary(&outcome.summary, &config.summary_path());
        append_telemetry(&outcome.summary, &config.telemetry_path());
    }
    Ok(())
}
