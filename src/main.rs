use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ibge_scrape::category::Category;
use ibge_scrape::cities::read_city_list;
use ibge_scrape::config::{Renderer, ScrapeConfig, DEFAULT_OUTPUT_DIR};
use ibge_scrape::merge::merge;
use ibge_scrape::orchestrator::Orchestrator;
use ibge_scrape::retry::RetryPolicy;
use ibge_scrape::session::ConfiguredFactory;
use ibge_scrape::store::ShardStore;
use ibge_scrape::warehouse::build_warehouse;
use ibge_scrape::{info_time, Error, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable, sharded scraper for municipal indicators")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape every shard that isn't marked complete yet.
    Scrape(ScrapeArgs),
    /// Rebuild the per-category tables from the completed shards.
    Merge(OutputArgs),
    /// Join the merged tables into data_warehouse.tsv.
    Warehouse(OutputArgs),
    /// Scrape, then merge and build the warehouse if every shard completed.
    Run(ScrapeArgs),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory holding shards and merged tables.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Categories to handle, comma separated. Defaults to all of them.
    #[arg(short = 'c', long, value_delimiter = ',', value_parser = parse_category)]
    categories: Vec<Category>,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    #[command(flatten)]
    output: OutputArgs,

    /// City list, one `identifier<TAB>name` per line.
    #[arg(short = 'i', long)]
    cities: PathBuf,

    /// Number of concurrent workers, and so of shards.
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    #[arg(long)]
    base_url: Option<String>,

    /// Browserless-compatible render service. Without it pages are fetched with plain
    /// GETs, which never see the portal's script-rendered tables: every category
    /// exhausts its attempts and is recorded as null.
    #[arg(long, env = "RENDER_ENDPOINT")]
    render_endpoint: Option<String>,

    #[arg(long, env = "RENDER_TOKEN")]
    render_token: Option<String>,

    /// Pause after every page load, in milliseconds.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Pause between attempts, in milliseconds.
    #[arg(long)]
    backoff_ms: Option<u64>,

    #[arg(long)]
    max_attempts: Option<usize>,
}

fn parse_category(s: &str) -> core::result::Result<Category, String> {
    Category::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
        format!("unknown category {s:?}, expected one of {}", names.join(", "))
    })
}

impl OutputArgs {
    fn apply(&self, config: &mut ScrapeConfig) {
        config.output_dir = self.output.clone();
        if !self.categories.is_empty() {
            config.categories = self.categories.clone();
        }
    }
}

impl ScrapeArgs {
    fn config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig::default();
        self.output.apply(&mut config);
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(endpoint) = &self.render_endpoint {
            config.renderer = Renderer::Service {
                endpoint: endpoint.clone(),
                token: self.render_token.clone(),
            };
        }
        if let Some(ms) = self.settle_ms {
            config.settle_delay = Duration::from_millis(ms);
        }
        let attempts = self.max_attempts.unwrap_or(config.retry.max_attempts());
        let backoff = self
            .backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(config.retry.backoff());
        config.retry = RetryPolicy::new(attempts, backoff);
        config
    }
}

/// Returns whether every shard is complete.
async fn scrape(args: &ScrapeArgs) -> Result<bool> {
    let config = args.config();
    if !config.renders_scripts() {
        tracing::warn!(
            "no render endpoint configured; plain HTTP can't see the portal's tables, \
             expect every category to come back empty (set --render-endpoint or RENDER_ENDPOINT)"
        );
    }
    let cities = read_city_list(&args.cities).await?;
    info_time!("Read {} cities from {}", cities.len(), args.cities.display());

    let factory = ConfiguredFactory::new(&config);
    let report = Orchestrator::new(config, factory).run(&cities).await?;
    for (index, reason) in &report.failed {
        tracing::warn!(shard = index, "pending: {reason}");
    }
    Ok(report.is_complete())
}

async fn merge_output(args: &OutputArgs) -> Result<()> {
    let mut config = ScrapeConfig::default();
    args.apply(&mut config);
    let report = merge(&ShardStore::new(&config.output_dir), &config.categories).await?;
    info_time!("Merged {} shards", report.shards.len());
    Ok(())
}

async fn warehouse(args: &OutputArgs) -> Result<()> {
    let mut config = ScrapeConfig::default();
    args.apply(&mut config);
    build_warehouse(&ShardStore::new(&config.output_dir), &config.categories).await?;
    Ok(())
}

async fn execute(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Scrape(args) => scrape(&args).await,
        Command::Merge(args) => merge_output(&args).await.map(|_| true),
        Command::Warehouse(args) => warehouse(&args).await.map(|_| true),
        Command::Run(args) => {
            if !scrape(&args).await? {
                tracing::warn!("some shards are still pending, run again to retry them");
                return Ok(false);
            }
            merge_output(&args.output).await?;
            warehouse(&args.output).await?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ibge_scrape=info")),
        )
        .init();

    let start_time = Local::now();
    let cli = Cli::parse();
    let outcome: Result<bool> = execute(cli).await;
    info_time!(start_time, "Full program time:");

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err @ Error::PlanMismatch { .. }) | Err(err @ Error::Config(_)) => {
            tracing::error!("{err}");
            ExitCode::from(3)
        }
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
