//! Local price table for instruments the quote provider does not serve.
//!
//! The file is a CSV with a `date` column followed by one column per
//! identifier:
//!
//! ```text
//! date,FR0010149302,LU1882449801
//! 2024-01-02,1734.12,101.5
//! 2024-01-03,1736.80,
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::types::{PriceMap, PriceSeries};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverrideTable {
    prices: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl OverrideTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        info!(
            "loaded {} override columns from {}",
            table.prices.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| DashboardError::OverrideFile {
                row: 1,
                message: e.to_string(),
            })?
            .clone();
        if headers.len() < 2 {
            return Err(DashboardError::OverrideFile {
                row: 1,
                message: "expected a date column followed by identifier columns".into(),
            });
        }
        let identifiers: Vec<String> = headers.iter().skip(1).map(String::from).collect();

        let mut prices: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for (i, record) in reader.records().enumerate() {
            // header is line 1
            let row = i + 2;
            let record = record.map_err(|e| DashboardError::OverrideFile {
                row,
                message: e.to_string(),
            })?;

            let raw_date = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|e| {
                DashboardError::OverrideFile {
                    row,
                    message: format!("bad date {:?}: {}", raw_date, e),
                }
            })?;

            for (identifier, cell) in identifiers.iter().zip(record.iter().skip(1)) {
                if cell.is_empty() {
                    continue;
                }
                let price: f64 = cell.parse().map_err(|_| DashboardError::OverrideFile {
                    row,
                    message: format!("non-numeric price {:?} for {}", cell, identifier),
                })?;
                prices
                    .entry(identifier.clone())
                    .or_default()
                    .insert(date, price);
            }
        }

        Ok(Self { prices })
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }

    /// Fills gaps in `fetched` for the requested identifiers, using only
    /// rows dated on or after `start`. Dates already present in `fetched`
    /// keep their fetched price. Returns the number of identifiers touched.
    pub fn merge_into(
        &self,
        fetched: &mut PriceMap,
        requested: &BTreeSet<String>,
        start: NaiveDate,
    ) -> usize {
        let mut touched = 0;
        for (identifier, extra) in &self.prices {
            if !requested.contains(identifier) {
                continue;
            }
            let in_window = extra.range(start..).map(|(d, p)| (*d, *p));
            let merged = match fetched.get(identifier) {
                Some(existing) => Some(existing.filled_from(in_window)),
                None => PriceSeries::new(in_window),
            };
            if let Some(series) = merged {
                if fetched.get(identifier) != Some(&series) {
                    debug!("override filled gaps for {}", identifier);
                    touched += 1;
                }
                fetched.insert(identifier.clone(), series);
            }
        }
        touched
    }
}
