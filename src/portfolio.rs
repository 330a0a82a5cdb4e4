use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::types::{Allocation, CumulativeIndex, PriceMap};

/// Weighted cumulative index of the instruments in `allocation` that have
/// prices.
///
/// Weights are renormalized over the instruments present in `prices`.
/// Returns are aligned on the union of their trading dates: a date on which
/// an instrument has no price counts as a zero return for it, and its next
/// price is compared with the last one it had.
pub fn aggregate(allocation: &Allocation, prices: &PriceMap) -> Result<CumulativeIndex> {
    aggregate_with_weights(allocation, prices).map(|(_, index)| index)
}

/// Like [`aggregate`], also returning the renormalized weights the index
/// was built from.
pub fn aggregate_with_weights(
    allocation: &Allocation,
    prices: &PriceMap,
) -> Result<(Allocation, CumulativeIndex)> {
    let weights = allocation.renormalized(|id| prices.contains_key(id))?;
    debug!(
        "aggregating {} of {} holdings",
        weights.len(),
        allocation.len()
    );

    let dates: BTreeSet<NaiveDate> = weights
        .identifiers()
        .filter_map(|id| prices.get(id))
        .flat_map(|series| series.dates().copied())
        .collect();

    let mut portfolio_returns = vec![0.0; dates.len()];
    for (id, weight) in weights.iter() {
        let series = prices.get(id).ok_or(DashboardError::NoValidHoldings)?;
        let mut last_price: Option<f64> = None;
        for (slot, date) in portfolio_returns.iter_mut().zip(&dates) {
            if let Some(price) = series.get(date) {
                if let Some(prev) = last_price {
                    *slot += weight * (price / prev - 1.0);
                }
                last_price = Some(price);
            }
        }
    }

    let index = CumulativeIndex::compound(dates.into_iter().zip(portfolio_returns));
    Ok((weights, index))
}

/// The allocation the dashboard tracks when no allocation file is given.
pub fn default_allocation() -> Result<Allocation> {
    Allocation::new([
        (LVMH, 0.05),
        (AIR_LIQUIDE, 0.05),
        (SCHNEIDER, 0.05),
        (TOTAL_ENERGIES, 0.04),
        (SANOFI, 0.05),
        (LOREAL, 0.04),
        (EMU_SMALL_CAP, 0.15),
        (SP500, 0.11),
        (CARMIGNAC_PATRIMOINE, 0.16),
        (BOND_FUND, 0.17),
        (EUROPE_REAL_ESTATE, 0.05),
        (EMERGING, 0.08),
    ])
}

pub const DEFAULT_BENCHMARK: &str = "^FCHI";

const LVMH: &str = "MC.PA";
const AIR_LIQUIDE: &str = "AI.PA";
const SCHNEIDER: &str = "SU.PA";
const TOTAL_ENERGIES: &str = "TTE.PA";
const SANOFI: &str = "SAN.PA";
const LOREAL: &str = "OR.PA";
const EMU_SMALL_CAP: &str = "CEM.PA";
const SP500: &str = "ESE.PA";
const EUROPE_REAL_ESTATE: &str = "EPRE.PA";
const EMERGING: &str = "PAEEM.PA";
// funds quoted only by ISIN; prices come from the override file
const CARMIGNAC_PATRIMOINE: &str = "FR0010135103";
const BOND_FUND: &str = "LU1882449801";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceSeries;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(points.iter().map(|(d, p)| (day(*d), *p))).unwrap()
    }

    fn prices<const N: usize>(entries: [(&str, PriceSeries); N]) -> PriceMap {
        entries
            .into_iter()
            .map(|(id, series)| (id.to_string(), series))
            .collect()
    }

    #[test]
    fn test_weighted_two_instruments() {
        let allocation = Allocation::new([("A", 0.6), ("B", 0.4)]).unwrap();
        let prices = prices([
            ("A", series(&[(1, 100.0), (2, 110.0)])),
            ("B", series(&[(1, 50.0), (2, 45.0)])),
        ]);

        let index = aggregate(&allocation, &prices).unwrap();
        let values = index.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], 1.0);
        assert!((values[1] - 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_missing_instrument_gets_full_weight_elsewhere() {
        let allocation = Allocation::new([("A", 0.5), ("B", 0.5)]).unwrap();
        let prices = prices([(
            "A",
            series(&[(1, 100.0), (2, 104.0), (3, 101.0), (6, 107.5)]),
        )]);

        let index = aggregate(&allocation, &prices).unwrap();
        assert_eq!(index, CumulativeIndex::from_prices(&prices["A"]));
    }

    #[test]
    fn test_weights_match_the_index() {
        let allocation = Allocation::new([("A", 0.2), ("B", 0.3), ("C", 0.5)]).unwrap();
        let prices = prices([
            ("A", series(&[(1, 100.0), (2, 110.0)])),
            ("C", series(&[(1, 10.0), (2, 10.0)])),
        ]);

        let (weights, index) = aggregate_with_weights(&allocation, &prices).unwrap();
        assert_eq!(weights.identifiers().collect::<Vec<_>>(), vec!["A", "C"]);
        assert!((weights.weight("A").unwrap() - 0.2 / 0.7).abs() < 1e-12);
        assert!((weights.weight("C").unwrap() - 0.5 / 0.7).abs() < 1e-12);
        assert_eq!(index, aggregate(&allocation, &prices).unwrap());
        assert!((index.last().unwrap() - (1.0 + 0.1 * 0.2 / 0.7)).abs() < 1e-12);
    }

    #[test]
    fn test_no_matching_holdings() {
        let allocation = Allocation::new([("A", 1.0)]).unwrap();
        let prices = prices([("Z", series(&[(1, 10.0), (2, 11.0)]))]);
        assert!(matches!(
            aggregate(&allocation, &prices),
            Err(DashboardError::NoValidHoldings)
        ));
        assert!(matches!(
            aggregate(&allocation, &PriceMap::new()),
            Err(DashboardError::NoValidHoldings)
        ));
    }

    #[test]
    fn test_first_value_is_one() {
        let allocation = Allocation::new([("A", 0.3), ("B", 0.3), ("C", 0.4)]).unwrap();
        let prices = prices([
            ("A", series(&[(2, 10.0), (3, 12.0)])),
            ("B", series(&[(1, 7.0), (3, 6.0)])),
            ("C", series(&[(1, 1.0)])),
        ]);
        let index = aggregate(&allocation, &prices).unwrap();
        assert_eq!(index.first(), Some(1.0));
    }

    #[test]
    fn test_union_alignment_on_holiday_mismatch() {
        // B has no quote on the 2nd; its move from the 1st shows up on the 3rd
        let allocation = Allocation::new([("A", 0.5), ("B", 0.5)]).unwrap();
        let prices = prices([
            ("A", series(&[(1, 100.0), (2, 110.0), (3, 110.0)])),
            ("B", series(&[(1, 100.0), (3, 120.0)])),
        ]);
        let index = aggregate(&allocation, &prices).unwrap();
        let values = index.values();
        assert_eq!(index.dates(), vec![day(1), day(2), day(3)]);
        assert!((values[1] - 1.05).abs() < 1e-12);
        assert!((values[2] - 1.05 * 1.10).abs() < 1e-12);
    }

    #[test]
    fn test_default_allocation_sums_to_one() {
        let allocation = default_allocation().unwrap();
        assert!(allocation.sums_to_one());
        assert_eq!(allocation.len(), 12);
    }
}
