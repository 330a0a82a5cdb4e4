use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{DashboardError, Result};

pub type PriceMap = BTreeMap<String, PriceSeries>;

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Target weight per instrument identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    weights: BTreeMap<String, f64>,
}

impl Allocation {
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut weights = BTreeMap::new();
        for (id, weight) in entries {
            let id = id.into();
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(DashboardError::InvalidAllocation(format!(
                    "weight {} for {} is outside [0, 1]",
                    weight, id
                )));
            }
            if weights.insert(id.clone(), weight).is_some() {
                return Err(DashboardError::InvalidAllocation(format!(
                    "{} is listed twice",
                    id
                )));
            }
        }
        if weights.is_empty() {
            return Err(DashboardError::InvalidAllocation(
                "allocation has no instruments".into(),
            ));
        }
        Ok(Self { weights })
    }

    /// Reads a JSON object of `identifier -> weight`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let weights: BTreeMap<String, f64> = serde_json::from_str(&raw)
            .map_err(|e| DashboardError::InvalidAllocation(e.to_string()))?;
        Self::new(weights)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn weight(&self, identifier: &str) -> Option<f64> {
        self.weights.get(identifier).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(id, w)| (id.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn sums_to_one(&self) -> bool {
        (self.total() - 1.0).abs() < WEIGHT_TOLERANCE
    }

    /// Keeps only the instruments for which `available` holds and scales
    /// their weights back up to 1.0.
    pub fn renormalized<F>(&self, available: F) -> Result<Allocation>
    where
        F: Fn(&str) -> bool,
    {
        let kept: BTreeMap<String, f64> = self
            .weights
            .iter()
            .filter(|(id, _)| available(id))
            .map(|(id, w)| (id.clone(), *w))
            .collect();

        let total: f64 = kept.values().sum();
        if kept.is_empty() || total <= 0.0 {
            return Err(DashboardError::NoValidHoldings);
        }

        let weights = kept
            .into_iter()
            .map(|(id, w)| (id, w / total))
            .collect();
        Ok(Allocation { weights })
    }
}

/// One trading day as returned by a quote provider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub adjclose: Option<f64>,
}

impl DailyBar {
    /// Adjusted close when the provider has a usable one, plain close otherwise.
    pub fn closing_price(&self) -> Option<f64> {
        self.adjclose
            .filter(|p| usable_price(*p))
            .or_else(|| self.close.filter(|p| usable_price(*p)))
    }
}

fn usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Closing prices of one instrument, ordered by date. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
    points: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let points: BTreeMap<NaiveDate, f64> = points
            .into_iter()
            .filter(|(_, price)| usable_price(*price))
            .collect();
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    pub fn from_bars(bars: &[DailyBar]) -> Option<Self> {
        Self::new(
            bars.iter()
                .filter_map(|bar| bar.closing_price().map(|p| (bar.date, p))),
        )
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.points.get(date).copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.points.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, p)| (*d, *p))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        *self.points.keys().next().unwrap_or(&NaiveDate::MIN)
    }

    pub fn last_date(&self) -> NaiveDate {
        *self.points.keys().next_back().unwrap_or(&NaiveDate::MIN)
    }

    /// A new series holding every existing point plus those `extra` points
    /// whose dates are not already present.
    pub fn filled_from<I>(&self, extra: I) -> PriceSeries
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut points = self.points.clone();
        for (date, price) in extra {
            if usable_price(price) {
                points.entry(date).or_insert(price);
            }
        }
        PriceSeries { points }
    }

    /// Period-over-period fractional change; the first period is zero.
    pub fn returns(&self) -> Vec<(NaiveDate, f64)> {
        let mut previous: Option<f64> = None;
        self.points
            .iter()
            .map(|(date, price)| {
                let r = previous.map_or(0.0, |prev| price / prev - 1.0);
                previous = Some(*price);
                (*date, r)
            })
            .collect()
    }
}

/// Growth of one unit invested, one value per date.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeIndex {
    points: Vec<(NaiveDate, f64)>,
}

impl CumulativeIndex {
    /// Running product of `1 + r`, seeded at 1.0.
    pub fn compound<I>(returns: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut level = 1.0;
        let points = returns
            .into_iter()
            .map(|(date, r)| {
                level *= 1.0 + r;
                (date, level)
            })
            .collect();
        Self { points }
    }

    pub fn from_prices(prices: &PriceSeries) -> Self {
        Self::compound(prices.returns())
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn first(&self) -> Option<f64> {
        self.points.first().map(|(_, v)| *v)
    }

    pub fn last(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }

    /// `(last - 1) * 100`, or zero for an empty index.
    pub fn total_return_pct(&self) -> f64 {
        self.last().map_or(0.0, |last| (last - 1.0) * 100.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchmarkSource {
    Real,
    Synthetic { seed: u64 },
}

impl BenchmarkSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, BenchmarkSource::Synthetic { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkIndex {
    pub identifier: String,
    pub source: BenchmarkSource,
    pub index: CumulativeIndex,
}

impl BenchmarkIndex {
    pub fn label(&self) -> String {
        match self.source {
            BenchmarkSource::Real => self.identifier.clone(),
            BenchmarkSource::Synthetic { .. } => format!("{} (synthetic)", self.identifier),
        }
    }
}
