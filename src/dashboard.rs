use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::error::{DashboardError, Result};
use crate::fetcher::{BenchmarkFallback, PriceFetcher};
use crate::portfolio;
use crate::provider::QuoteProvider;
use crate::types::{Allocation, BenchmarkIndex, CumulativeIndex};

/// Everything the presentation layer shows for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Dashboard {
    pub start: NaiveDate,
    pub allocation: Allocation,
    pub effective_weights: Allocation,
    pub portfolio: CumulativeIndex,
    pub benchmark: BenchmarkIndex,
    pub skipped: Vec<String>,
}

impl Dashboard {
    pub fn portfolio_return_pct(&self) -> f64 {
        self.portfolio.total_return_pct()
    }

    pub fn benchmark_return_pct(&self) -> f64 {
        self.benchmark.index.total_return_pct()
    }
}

/// Fetches, aggregates and compares. Stops at the first batch-level error;
/// the benchmark is only requested once the portfolio side is complete.
#[instrument(skip(fetcher, allocation))]
pub async fn build<P: QuoteProvider>(
    fetcher: &PriceFetcher<P>,
    allocation: &Allocation,
    benchmark: &str,
    start: NaiveDate,
    fallback: BenchmarkFallback,
) -> Result<Dashboard> {
    let identifiers: BTreeSet<String> = allocation.identifiers().map(String::from).collect();
    let batch = fetcher.fetch_prices(&identifiers, start).await;
    if batch.prices.is_empty() {
        return Err(DashboardError::NoDataAvailable);
    }

    let (effective_weights, portfolio) =
        portfolio::aggregate_with_weights(allocation, &batch.prices)?;
    let benchmark = fetcher.fetch_benchmark(benchmark, start, fallback).await?;

    let skipped = batch
        .failures
        .keys()
        .filter(|id| !batch.prices.contains_key(*id))
        .cloned()
        .collect();

    info!(
        "portfolio {:.2}% vs {} {:.2}%",
        portfolio.total_return_pct(),
        benchmark.label(),
        benchmark.index.total_return_pct()
    );

    Ok(Dashboard {
        start,
        allocation: allocation.clone(),
        effective_weights,
        portfolio,
        benchmark,
        skipped,
    })
}
