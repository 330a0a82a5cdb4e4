use polars::prelude::*;

use crate::dashboard::Dashboard;

/// Target and effective weight per instrument, in percent. Instruments left
/// out for lack of data show an effective weight of zero.
pub fn allocation_frame(dashboard: &Dashboard) -> PolarsResult<DataFrame> {
    let mut instruments = Vec::with_capacity(dashboard.allocation.len());
    let mut targets = Vec::with_capacity(dashboard.allocation.len());
    let mut effective = Vec::with_capacity(dashboard.allocation.len());
    for (id, weight) in dashboard.allocation.iter() {
        instruments.push(id.to_string());
        targets.push(weight * 100.0);
        effective.push(dashboard.effective_weights.weight(id).unwrap_or(0.0) * 100.0);
    }
    df!(
        "instrument" => instruments,
        "target_pct" => targets,
        "effective_pct" => effective
    )
}

/// The two headline metrics, one row per series.
pub fn summary_frame(dashboard: &Dashboard) -> PolarsResult<DataFrame> {
    let source = if dashboard.benchmark.source.is_synthetic() {
        "SYNTHETIC"
    } else {
        "market data"
    };
    df!(
        "series" => ["Portfolio".to_string(), dashboard.benchmark.label()],
        "total_return_pct" => [dashboard.portfolio_return_pct(), dashboard.benchmark_return_pct()],
        "source" => ["market data", source]
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::types::{Allocation, BenchmarkIndex, BenchmarkSource, CumulativeIndex};

    fn dashboard(source: BenchmarkSource) -> Dashboard {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let allocation = Allocation::new([("A", 0.6), ("B", 0.4)]).unwrap();
        Dashboard {
            start: d1,
            effective_weights: allocation.renormalized(|id| id == "A").unwrap(),
            allocation,
            portfolio: CumulativeIndex::compound([(d1, 0.0), (d2, 0.02)]),
            benchmark: BenchmarkIndex {
                identifier: "^FCHI".into(),
                source,
                index: CumulativeIndex::compound([(d1, 0.0), (d2, -0.01)]),
            },
            skipped: vec!["B".into()],
        }
    }

    #[test]
    fn test_allocation_frame() {
        let df = allocation_frame(&dashboard(BenchmarkSource::Real)).unwrap();
        assert_eq!(df.shape(), (2, 3));
        let effective: Vec<Option<f64>> = df
            .column("effective_pct")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(effective, vec![Some(100.0), Some(0.0)]);
    }

    #[test]
    fn test_summary_marks_synthetic_benchmark() {
        let df = summary_frame(&dashboard(BenchmarkSource::Synthetic { seed: 3 })).unwrap();
        assert_eq!(df.shape(), (2, 3));
        let sources: Vec<Option<&str>> = df
            .column("source")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(sources, vec![Some("market data"), Some("SYNTHETIC")]);
    }
}
