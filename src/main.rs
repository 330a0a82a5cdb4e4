use std::path::PathBuf;
use std::time::Duration;

use allocation_benchmark::config::{self, Config};
use allocation_benchmark::fetcher::PriceFetcher;
use allocation_benchmark::overrides::OverrideTable;
use allocation_benchmark::portfolio::default_allocation;
use allocation_benchmark::provider::{QuoteProvider, YahooProvider};
use allocation_benchmark::{chart, report, Allocation};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "allocation-benchmark")]
#[command(about = "Compare a fixed-weight allocation with a benchmark index", long_about = None)]
struct Cli {
    /// First day of the comparison (YYYY-MM-DD), default one year ago
    #[arg(short, long, value_parser = config::parse_date)]
    start: Option<NaiveDate>,

    /// JSON file mapping identifiers to weights
    #[arg(short, long)]
    allocation: Option<PathBuf>,

    /// CSV of prices for instruments the provider does not serve
    #[arg(short, long)]
    overrides: Option<PathBuf>,

    /// Benchmark ticker
    #[arg(short, long)]
    benchmark: Option<String>,

    /// Where to write the SVG chart
    #[arg(short, long)]
    chart: Option<PathBuf>,

    /// Substitute a seeded random walk if the benchmark cannot be fetched (demo only)
    #[arg(long)]
    synthetic_fallback: bool,

    /// Re-run every N seconds, reusing cached prices until they expire
    #[arg(long)]
    refresh_every: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut Config) -> Option<u64> {
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(path) = self.allocation {
            config.allocation_path = Some(path);
        }
        if let Some(path) = self.overrides {
            config.overrides_path = Some(path);
        }
        if let Some(benchmark) = self.benchmark {
            config.benchmark = benchmark;
        }
        if let Some(path) = self.chart {
            config.chart_path = path;
        }
        config.synthetic_fallback |= self.synthetic_fallback;
        self.refresh_every
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut config = Config::from_env()?;
    let refresh_every = Cli::parse().apply(&mut config);
    info!("config: {:?}", config);

    let allocation = match &config.allocation_path {
        Some(path) => Allocation::from_json_file(path)
            .with_context(|| format!("reading allocation {}", path.display()))?,
        None => default_allocation()?,
    };
    if !allocation.sums_to_one() {
        warn!(
            "allocation weights sum to {:.4}, they will be renormalized",
            allocation.total()
        );
    }

    let mut fetcher = PriceFetcher::new(YahooProvider::new(), config.cache_ttl);
    if let Some(path) = &config.overrides_path {
        let overrides = OverrideTable::from_path(path)
            .with_context(|| format!("reading overrides {}", path.display()))?;
        fetcher = fetcher.with_overrides(overrides);
    }

    let Some(secs) = refresh_every else {
        return run(&fetcher, &allocation, &config).await;
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run(&fetcher, &allocation, &config).await {
                    error!("{:#}", e);
                }
                info!("cache: {:?}", fetcher.cache().stats().await);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}

async fn run<P: QuoteProvider>(
    fetcher: &PriceFetcher<P>,
    allocation: &Allocation,
    config: &Config,
) -> Result<()> {
    let start_time = std::time::Instant::now();
    let dashboard = allocation_benchmark::build(
        fetcher,
        allocation,
        &config.benchmark,
        config.start_date,
        config.benchmark_fallback(),
    )
    .await?;
    info!("pipeline took {:?}", start_time.elapsed());

    println!("Allocation since {}:", dashboard.start);
    println!("{}", report::allocation_frame(&dashboard)?);
    if !dashboard.skipped.is_empty() {
        println!("No data for: {}", dashboard.skipped.join(", "));
    }
    if dashboard.benchmark.source.is_synthetic() {
        println!(
            "WARNING: {} could not be fetched, the benchmark below is SYNTHETIC demo data",
            dashboard.benchmark.identifier
        );
    }
    println!("{}", report::summary_frame(&dashboard)?);

    let svg = chart::render_chart(&dashboard.portfolio, &dashboard.benchmark);
    chart::write_chart(&config.chart_path, &svg)?;

    println!("Portfolio total return: {:+.2}%", dashboard.portfolio_return_pct());
    println!(
        "{} total return: {:+.2}%",
        dashboard.benchmark.label(),
        dashboard.benchmark_return_pct()
    );
    Ok(())
}
