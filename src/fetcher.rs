use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::{stream::FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::cache::{FetchOutcome, PriceCache};
use crate::error::{DashboardError, FetchFailure, Result};
use crate::overrides::OverrideTable;
use crate::provider::QuoteProvider;
use crate::synthetic;
use crate::types::{BenchmarkIndex, BenchmarkSource, CumulativeIndex, PriceMap, PriceSeries};

/// What happened to each identifier of one `fetch_prices` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PriceBatch {
    pub prices: PriceMap,
    pub failures: BTreeMap<String, FetchFailure>,
}

/// Whether a failed benchmark fetch may be replaced by a random walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchmarkFallback {
    Fail,
    Synthetic { seed: u64 },
}

pub struct PriceFetcher<P> {
    provider: P,
    cache: PriceCache,
    overrides: Option<OverrideTable>,
}

impl<P: QuoteProvider> PriceFetcher<P> {
    pub fn new(provider: P, cache_ttl: Duration) -> Self {
        Self {
            provider,
            cache: PriceCache::new(cache_ttl),
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideTable) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Daily closing prices for every identifier that could be retrieved.
    /// Identifiers that fail are left out of `prices` and recorded in
    /// `failures`; the override table then fills whatever is still missing.
    pub async fn fetch_prices(
        &self,
        identifiers: &BTreeSet<String>,
        start: NaiveDate,
    ) -> PriceBatch {
        let mut batch = PriceBatch::default();

        let mut futures: FuturesUnordered<_> = identifiers
            .iter()
            .map(|id| async move { (id, self.fetch_one(id, start).await) })
            .collect();
        while let Some((id, outcome)) = futures.next().await {
            match outcome {
                Ok(series) => {
                    batch.prices.insert(id.clone(), series);
                }
                Err(failure) => {
                    warn!("skipping {}: {}", id, failure);
                    batch.failures.insert(id.clone(), failure);
                }
            }
        }

        if let Some(overrides) = &self.overrides {
            let filled = overrides.merge_into(&mut batch.prices, identifiers, start);
            if filled > 0 {
                info!("override table filled {} instruments", filled);
            }
        }

        info!(
            "retrieved {} of {} instruments",
            batch.prices.len(),
            identifiers.len()
        );
        batch
    }

    /// Cumulative index of the benchmark. With `BenchmarkFallback::Synthetic`
    /// a failed fetch yields a seeded random walk tagged as synthetic.
    pub async fn fetch_benchmark(
        &self,
        identifier: &str,
        start: NaiveDate,
        fallback: BenchmarkFallback,
    ) -> Result<BenchmarkIndex> {
        match self.fetch_one(identifier, start).await {
            Ok(series) => Ok(BenchmarkIndex {
                identifier: identifier.to_string(),
                source: BenchmarkSource::Real,
                index: CumulativeIndex::from_prices(&series),
            }),
            Err(reason) => match fallback {
                BenchmarkFallback::Fail => Err(DashboardError::BenchmarkUnavailable {
                    identifier: identifier.to_string(),
                    reason,
                }),
                BenchmarkFallback::Synthetic { seed } => {
                    warn!(
                        "benchmark {} unavailable ({}), substituting SYNTHETIC data (seed {})",
                        identifier, reason, seed
                    );
                    let today = Utc::now().date_naive();
                    Ok(BenchmarkIndex {
                        identifier: identifier.to_string(),
                        source: BenchmarkSource::Synthetic { seed },
                        index: synthetic::random_walk(start, today, seed),
                    })
                }
            },
        }
    }

    async fn fetch_one(&self, identifier: &str, start: NaiveDate) -> FetchOutcome {
        if let Some(outcome) = self.cache.get(identifier, start).await {
            return outcome;
        }

        let outcome = self
            .provider
            .daily_bars(identifier, start)
            .await
            .and_then(|bars| PriceSeries::from_bars(&bars).ok_or(FetchFailure::Empty));
        if let Ok(series) = &outcome {
            info!(
                "{}: {} closes from {} to {}",
                identifier,
                series.len(),
                series.first_date(),
                series.last_date()
            );
        }

        self.cache.insert(identifier, start, outcome.clone()).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::types::DailyBar;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    /// Serves canned bars and counts how often it is asked.
    #[derive(Clone, Default)]
    struct MockProvider {
        bars: HashMap<String, Vec<DailyBar>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn with_closes(mut self, identifier: &str, closes: &[(u32, f64)]) -> Self {
            let bars = closes
                .iter()
                .map(|(d, c)| DailyBar {
                    date: day(*d),
                    close: Some(*c),
                    adjclose: None,
                })
                .collect();
            self.bars.insert(identifier.to_string(), bars);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        async fn daily_bars(
            &self,
            identifier: &str,
            _start: NaiveDate,
        ) -> std::result::Result<Vec<DailyBar>, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.bars.get(identifier) {
                Some(bars) => Ok(bars.clone()),
                None => Err(FetchFailure::Request(format!("unknown symbol {}", identifier))),
            }
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failed_identifiers_are_skipped() {
        let provider = MockProvider::default()
            .with_closes("AAA", &[(1, 10.0), (2, 11.0)])
            .with_closes("EMPTY", &[]);
        let fetcher = PriceFetcher::new(provider, Duration::from_secs(60));

        let batch = fetcher.fetch_prices(&ids(&["AAA", "EMPTY", "NOPE"]), day(1)).await;
        assert_eq!(batch.prices.keys().collect::<Vec<_>>(), vec!["AAA"]);
        assert_eq!(batch.failures["EMPTY"], FetchFailure::Empty);
        assert!(matches!(batch.failures["NOPE"], FetchFailure::Request(_)));
        assert!(batch.prices.values().all(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn test_repeat_fetch_uses_cache() {
        let provider = MockProvider::default()
            .with_closes("AAA", &[(1, 10.0), (2, 11.0)])
            .with_closes("BBB", &[(1, 5.0), (2, 4.5)]);
        let probe = provider.clone();
        let fetcher = PriceFetcher::new(provider, Duration::from_secs(60));
        let wanted = ids(&["AAA", "BBB", "NOPE"]);

        let first = fetcher.fetch_prices(&wanted, day(1)).await;
        assert_eq!(probe.calls(), 3);
        let second = fetcher.fetch_prices(&wanted, day(1)).await;
        assert_eq!(probe.calls(), 3);
        assert_eq!(first, second);

        // a different start date is a different key
        fetcher.fetch_prices(&wanted, day(2)).await;
        assert_eq!(probe.calls(), 6);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let provider = MockProvider::default().with_closes("AAA", &[(1, 10.0)]);
        let probe = provider.clone();
        let fetcher = PriceFetcher::new(provider, Duration::ZERO);

        fetcher.fetch_prices(&ids(&["AAA"]), day(1)).await;
        fetcher.fetch_prices(&ids(&["AAA"]), day(1)).await;
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_overrides_fill_missing_instruments() {
        let provider = MockProvider::default().with_closes("AAA", &[(1, 10.0), (2, 11.0)]);
        let csv = "date,AAA,FR0010135103\n2024-02-01,99,100\n2024-02-02,,101\n";
        let fetcher = PriceFetcher::new(provider, Duration::from_secs(60))
            .with_overrides(OverrideTable::from_reader(csv.as_bytes()).unwrap());

        let batch = fetcher.fetch_prices(&ids(&["AAA", "FR0010135103"]), day(1)).await;
        assert_eq!(batch.prices["AAA"].get(&day(1)), Some(10.0));
        assert_eq!(batch.prices["FR0010135103"].len(), 2);
        assert!(batch.failures.contains_key("FR0010135103"));
    }

    #[tokio::test]
    async fn test_overrides_before_start_do_not_widen_the_window() {
        let provider = MockProvider::default().with_closes("AAA", &[(5, 10.0), (6, 10.0)]);
        let csv = "date,AAA
2024-02-01,4
2024-02-02,4.5
";
        let fetcher = PriceFetcher::new(provider, Duration::from_secs(60))
            .with_overrides(OverrideTable::from_reader(csv.as_bytes()).unwrap());

        let batch = fetcher.fetch_prices(&ids(&["AAA"]), day(5)).await;
        let series = &batch.prices["AAA"];
        assert_eq!(series.first_date(), day(5));
        assert_eq!(CumulativeIndex::from_prices(series).total_return_pct(), 0.0);
    }

    #[tokio::test]
    async fn test_benchmark_real() {
        let provider = MockProvider::default().with_closes("^FCHI", &[(1, 7000.0), (2, 7070.0)]);
        let fetcher = PriceFetcher::new(provider, Duration::from_secs(60));

        let benchmark = fetcher
            .fetch_benchmark("^FCHI", day(1), BenchmarkFallback::Synthetic { seed: 1 })
            .await
            .unwrap();
        assert_eq!(benchmark.source, BenchmarkSource::Real);
        assert_eq!(benchmark.index.first(), Some(1.0));
        assert!((benchmark.index.total_return_pct() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_benchmark_failure_without_fallback() {
        let fetcher = PriceFetcher::new(MockProvider::default(), Duration::from_secs(60));
        let result = fetcher
            .fetch_benchmark("^FCHI", day(1), BenchmarkFallback::Fail)
            .await;
        assert!(matches!(
            result,
            Err(DashboardError::BenchmarkUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_benchmark_synthetic_fallback_is_flagged() {
        let fetcher = PriceFetcher::new(MockProvider::default(), Duration::from_secs(60));
        let benchmark = fetcher
            .fetch_benchmark("^FCHI", day(1), BenchmarkFallback::Synthetic { seed: 42 })
            .await
            .unwrap();
        assert_eq!(benchmark.source, BenchmarkSource::Synthetic { seed: 42 });
        assert!(benchmark.index.values().iter().all(|v| *v > 0.0));
        assert_eq!(benchmark.label(), "^FCHI (synthetic)");
    }
}
